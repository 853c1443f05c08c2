use uuid::Uuid;

/// Boxed error carried by the adapter and handler variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by an [`AdvertisementHandler`](crate::AdvertisementHandler).
pub type HandlerError = BoxError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A construction argument or environment value is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The BLE adapter could not start or stop scanning.
    #[error("bluetooth adapter error: {0}")]
    Adapter(#[source] BoxError),

    /// The backend already runs a scan owned by someone else.
    #[error("a scan is already in progress on this adapter")]
    ScanInProgress,

    /// A handler failed while processing an advertisement.
    #[error("advertisement handler failed: {0}")]
    Handler(#[source] HandlerError),

    #[error("no device named {0:?} was found")]
    DeviceNotFound(String),

    #[error("characteristic {0} not found on device")]
    CharacteristicNotFound(Uuid),
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }
}

impl From<btleplug::Error> for Error {
    fn from(err: btleplug::Error) -> Self {
        Error::Adapter(Box::new(err))
    }
}

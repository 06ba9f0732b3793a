use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("invalid argument: {_0}")]
    Argument(#[error(not(source))] String),
    #[display("could not open the registry")]
    Registry,
    #[display("could not open the work queue")]
    Queue,
    #[display("could not open the archive")]
    Archive,
    #[display("could not set up the HTTP client")]
    Client,
    #[display("{_0} failed")]
    Command(#[error(not(source))] &'static str),
}

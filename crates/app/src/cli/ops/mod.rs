pub mod init;
pub mod keys;
pub mod receive;
pub mod send;
pub mod version;

pub use init::Init;
pub use keys::Keys;
pub use receive::Receive;
pub use send::SendFile;
pub use version::Version;

pub mod hash;
pub mod network;
pub mod request;
pub mod response;
pub mod vendor;

pub use hash::{Blake2b256Hasher, HashAlgorithm, RequestHasher, RequestId, Sha3_256Hasher};
pub use network::Network;
pub use request::{AddressedRequest, RequestKind, RequestPayload, SigningRequest};
pub use response::RelayedResponse;

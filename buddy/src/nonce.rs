/// Source of per-request nonces. A fresh nonce makes otherwise identical
/// requests land on distinct relay resources.
pub trait NonceSource: Send + Sync {
    fn next_nonce(&self) -> String;
}

impl<F> NonceSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_nonce(&self) -> String {
        self()
    }
}

/// 16 random bytes, hex encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNonce;

impl NonceSource for RandomNonce {
    fn next_nonce(&self) -> String {
        hex::encode(rand::random::<[u8; 16]>())
    }
}

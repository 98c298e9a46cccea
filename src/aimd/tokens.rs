use std::sync::Arc;

use futures::Stream;
use tokio::sync::{Mutex, mpsc};

/// Permission to perform one unit of work.
///
/// A token remembers the refill rate in effect when it was minted, which
/// tells the holder how hard the bucket is currently throttling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Token {
    rate_per_second: f64,
}

impl Token {
    pub(crate) const fn new(rate_per_second: f64) -> Self {
        Self { rate_per_second }
    }

    /// Refill rate, in tokens per second, at the moment this token was minted.
    pub const fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }
}

impl From<Token> for f64 {
    fn from(token: Token) -> Self {
        token.rate_per_second
    }
}

/// Creates the bounded queue between the controller task and the consumers.
pub(crate) fn channel(bucket_size: usize) -> (mpsc::Sender<Token>, Tokens) {
    let (sender, receiver) = mpsc::channel(bucket_size);
    let tokens = Tokens {
        receiver: Arc::new(Mutex::new(receiver)),
        sender: sender.clone(),
    };
    (sender, tokens)
}

/// The consuming end of a token bucket.
///
/// Cloning is cheap and every clone drains the same queue. Each token is
/// handed to exactly one consumer; waiting consumers are served in the order
/// they started waiting.
#[derive(Clone, Debug)]
pub struct Tokens {
    receiver: Arc<Mutex<mpsc::Receiver<Token>>>,
    // Keeps the channel open for as long as anyone can consume from it. A
    // stopped bucket then looks like an empty one instead of a closed one.
    sender: mpsc::Sender<Token>,
}

impl Tokens {
    /// Waits for the next token.
    ///
    /// There is no timeout. Once the bucket is stopped and drained this never
    /// completes, so wrap it in `tokio::time::timeout` or a `select!` when the
    /// caller needs to give up. Dropping the future never loses a token.
    pub async fn recv(&self) -> Token {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(token) => token,
            None => futures::future::pending().await,
        }
    }

    /// Takes a token if one is queued right now.
    ///
    /// Returns `None` when the queue is empty, and also while another
    /// consumer is parked in [`recv`](Self::recv). A parked consumer has first
    /// claim on the next token, so `try_recv` can return `None` while
    /// [`len`](Self::len) is still non-zero: the token is queued but already
    /// promised to the waiter.
    pub fn try_recv(&self) -> Option<Token> {
        let mut receiver = self.receiver.try_lock().ok()?;
        receiver.try_recv().ok()
    }

    /// Number of tokens currently queued.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bucket size.
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Turns the queue into an endless stream of tokens.
    pub fn into_stream(self) -> impl Stream<Item = Token> + Send + 'static {
        futures::stream::unfold(self, |tokens| async move {
            let token = tokens.recv().await;
            Some((token, tokens))
        })
    }
}

use std::fmt;
use tokio::sync::oneshot;

use super::error::HuntError;
use crate::bitmap::SharedImage;
use crate::handlers::LoadedFrom;

/// Scheduling priority, `Low < Normal < High`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        })
    }
}

/// Identity of one attachment to a hunter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Successful hunt result
#[derive(Debug, Clone)]
pub struct Delivery {
    pub image: SharedImage,
    pub loaded_from: LoadedFrom,
}

pub type HuntResult = Result<Delivery, HuntError>;

/// A caller waiting on a hunter's outcome
#[derive(Debug)]
pub struct Consumer {
    id: ConsumerId,
    priority: Priority,
    reply: oneshot::Sender<HuntResult>,
}

impl Consumer {
    pub fn new(id: ConsumerId, priority: Priority) -> (Self, oneshot::Receiver<HuntResult>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                id,
                priority,
                reply,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Send the outcome; a receiver that went away is ignored.
    pub fn deliver(self, result: HuntResult) {
        let _ = self.reply.send(result);
    }
}

use rand::Rng;

use crate::messaging::types::InboundMessage;

/// Decides whether a non-command message gets a reply.
///
/// Consulted once per free-text message; implementations must not have side
/// effects visible to the pipeline.
pub trait ResponseDecider: Send + Sync {
    fn should_respond(&self, msg: &InboundMessage) -> bool;
}

/// Replies with a fixed probability, independent of content.
#[derive(Clone, Copy, Debug)]
pub struct RandomDecider {
    probability: f64,
}

impl RandomDecider {
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl ResponseDecider for RandomDecider {
    fn should_respond(&self, _msg: &InboundMessage) -> bool {
        rand::thread_rng().gen_bool(self.probability)
    }
}

/// Always answers the same way.
#[derive(Clone, Copy, Debug)]
pub struct FixedDecider(pub bool);

impl ResponseDecider for FixedDecider {
    fn should_respond(&self, _msg: &InboundMessage) -> bool {
        self.0
    }
}

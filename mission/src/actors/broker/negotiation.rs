//! Offer desk - per-requester negotiation over a fixed offer sequence
//!
//! Every requester walks the same ordered offer list with its own cursor.
//! The cursor only moves forward (one step per decision), and a run of
//! rejections earns the requester a cooldown before the next offer.

use shared_types::Offer;
use std::collections::HashMap;

pub const ACCEPTED_MESSAGE: &str = "Perfect, the job is on.";
pub const REJECTED_MESSAGE: &str = "Ok, I'll look for another option...";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NegotiationState {
    /// Index of the next offer in the sequence
    pub cursor: u32,
    pub consecutive_rejections: u32,
}

/// Result of asking the desk for the next offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServedOffer {
    /// `None` once the requester exhausted the sequence
    pub offer: Option<Offer>,
    /// Position of the offer in the sequence (1-based, for logs)
    pub position: u32,
    /// The requester hit the rejection limit; the reply must be delayed
    pub cooldown_due: bool,
}

#[derive(Debug, Clone)]
pub struct OfferDesk {
    offers: Vec<Offer>,
    requesters: HashMap<String, NegotiationState>,
    rejection_limit: u32,
}

impl OfferDesk {
    pub fn new(offers: Vec<Offer>, rejection_limit: u32) -> Self {
        Self {
            offers,
            requesters: HashMap::new(),
            rejection_limit,
        }
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn state(&self, requester: &str) -> Option<NegotiationState> {
        self.requesters.get(requester).copied()
    }

    fn register(&mut self, requester: &str) -> &mut NegotiationState {
        self.requesters
            .entry(requester.to_string())
            .or_insert_with(|| {
                tracing::info!(requester = %requester, "New requester registered");
                NegotiationState::default()
            })
    }

    pub fn next_offer(&mut self, requester: &str) -> ServedOffer {
        let rejection_limit = self.rejection_limit;
        let offer_count = self.offers.len();
        let state = self.register(requester);
        let cursor = state.cursor;

        if cursor as usize >= offer_count {
            return ServedOffer {
                offer: None,
                position: cursor,
                cooldown_due: false,
            };
        }

        let cooldown_due = state.consecutive_rejections >= rejection_limit;
        if cooldown_due {
            state.consecutive_rejections = 0;
        }

        ServedOffer {
            offer: self.offers.get(cursor as usize).copied(),
            position: cursor + 1,
            cooldown_due,
        }
    }

    /// Record a decision on the current offer; the cursor always advances
    pub fn decide(&mut self, requester: &str, accepted: bool) -> &'static str {
        let state = self.register(requester);
        let position = state.cursor + 1;
        state.cursor = state.cursor.saturating_add(1);

        if accepted {
            state.consecutive_rejections = 0;
            tracing::info!(requester = %requester, offer = position, "Offer accepted");
            ACCEPTED_MESSAGE
        } else {
            state.consecutive_rejections += 1;
            tracing::info!(
                requester = %requester,
                offer = position,
                consecutive_rejections = state.consecutive_rejections,
                "Offer rejected"
            );
            REJECTED_MESSAGE
        }
    }
}

//! Crew capability descriptors
//!
//! Everything that makes one crew member behave differently from another
//! lives here: ability trigger, loot bonus, failure ceilings and the mishap
//! that can end a distraction early.

use serde::{Deserialize, Serialize};

fn default_mishap_reason() -> String {
    "Unexpected personal trouble during the mission".to_string()
}

fn default_payment_ack() -> String {
    "Payment received, the amount is correct.".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewProfile {
    pub name: String,
    /// Risk level that latches the ability; `None` means no ability
    #[serde(default)]
    pub ability_trigger_level: Option<u32>,
    #[serde(default)]
    pub ability_label: String,
    /// Loot added per heist turn while the ability is active
    #[serde(default)]
    pub bonus_per_tick: i64,
    /// Risk level at which the heist fails
    pub failure_ceiling: u32,
    /// Replaces `failure_ceiling` once the ability is active
    #[serde(default)]
    pub boosted_failure_ceiling: Option<u32>,
    /// Chance (0.0-1.0) of a mishap at the distraction's halfway turn
    #[serde(default)]
    pub mishap_chance: f64,
    #[serde(default = "default_mishap_reason")]
    pub mishap_reason: String,
    #[serde(default = "default_payment_ack")]
    pub payment_ack: String,
}

impl CrewProfile {
    /// Chop helps out: extra loot every turn from 3 stars on
    pub fn franklin() -> Self {
        Self {
            name: "Franklin".to_string(),
            ability_trigger_level: Some(3),
            ability_label: "Chop is on the job: +$1000 per turn".to_string(),
            bonus_per_tick: 1000,
            failure_ceiling: 5,
            boosted_failure_ceiling: None,
            mishap_chance: 0.10,
            mishap_reason: "Chop barked and blew the cover".to_string(),
            payment_ack: "Excellent! The payment is correct.".to_string(),
        }
    }

    /// Trevor's rage raises the star ceiling from 5 to 7
    pub fn trevor() -> Self {
        Self {
            name: "Trevor".to_string(),
            ability_trigger_level: Some(5),
            ability_label: "Trevor's rage: star ceiling raised to 7".to_string(),
            bonus_per_tick: 0,
            failure_ceiling: 5,
            boosted_failure_ceiling: Some(7),
            mishap_chance: 0.10,
            mishap_reason: "Trevor got drunk halfway through".to_string(),
            payment_ack: "Just what I expected!".to_string(),
        }
    }

    pub fn failure_ceiling_for(&self, ability_active: bool) -> u32 {
        match (ability_active, self.boosted_failure_ceiling) {
            (true, Some(boosted)) => boosted,
            _ => self.failure_ceiling,
        }
    }

    pub fn triggers_ability(&self, risk_level: u32) -> bool {
        self.ability_trigger_level
            .is_some_and(|trigger| risk_level >= trigger)
    }

    pub fn validate(&self) -> Result<(), RosterError> {
        if self.name.trim().is_empty() {
            return Err(RosterError::Invalid("crew member without a name".to_string()));
        }
        if !(0.0..=1.0).contains(&self.mishap_chance) {
            return Err(RosterError::Invalid(format!(
                "{}: mishap_chance must be within 0.0..=1.0, got {}",
                self.name, self.mishap_chance
            )));
        }
        if self.bonus_per_tick < 0 {
            return Err(RosterError::Invalid(format!(
                "{}: bonus_per_tick must not be negative",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to parse crew roster: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid crew roster: {0}")]
    Invalid(String),
}

/// The two crew members of a mission, in offer order (rate A, rate B)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewRoster {
    pub crew: Vec<CrewProfile>,
}

impl Default for CrewRoster {
    fn default() -> Self {
        Self {
            crew: vec![CrewProfile::franklin(), CrewProfile::trevor()],
        }
    }
}

impl CrewRoster {
    pub fn from_toml_str(raw: &str) -> Result<Self, RosterError> {
        let roster: CrewRoster = toml::from_str(raw)?;
        roster.validate()?;
        Ok(roster)
    }

    pub fn validate(&self) -> Result<(), RosterError> {
        if self.crew.len() != 2 {
            return Err(RosterError::Invalid(format!(
                "expected exactly 2 crew members, got {}",
                self.crew.len()
            )));
        }
        for profile in &self.crew {
            profile.validate()?;
        }
        if self.crew[0].name == self.crew[1].name {
            return Err(RosterError::Invalid(format!(
                "duplicate crew member '{}'",
                self.crew[0].name
            )));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CrewProfile> {
        self.crew.iter().find(|profile| profile.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.crew.iter().map(|profile| profile.name.clone()).collect()
    }
}

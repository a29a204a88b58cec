use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;
use crate::model::colour::Colour;

/// Number of cards dealt per round unless a trial overrides it.
pub const DEFAULT_CARD_POOL: u32 = 5;

/// One round: the red/blue split of the card pool and the colour the opponent reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    n_cards: u32,
    n_red: u32,
    outcome: i64,
    reward: Option<i8>,
    violation: Option<f64>,
}

impl Trial {
    /// Build a trial on the default pool. A missing outcome is drawn uniformly from `rng`.
    pub fn new<R: Rng + ?Sized>(
        n_red: u32,
        outcome: Option<Colour>,
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        Self::with_pool(DEFAULT_CARD_POOL, n_red, outcome, rng)
    }

    pub fn with_pool<R: Rng + ?Sized>(
        n_cards: u32,
        n_red: u32,
        outcome: Option<Colour>,
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        let outcome = match outcome {
            Some(colour) => colour,
            None => *Colour::ALL.choose(rng).unwrap_or(&Colour::Blue),
        };
        Self::from_raw(n_cards, n_red, outcome.value() as i64)
    }

    /// Build a trial from an unchecked outcome value, as read from a data file.
    ///
    /// The pool split is validated here; the outcome is validated by
    /// [`Trial::expectation`], which is the first place it is interpreted.
    pub fn from_raw(n_cards: u32, n_red: u32, outcome: i64) -> Result<Self, ModelError> {
        if n_cards == 0 {
            return Err(ModelError::InvalidField {
                field: "n_cards".to_string(),
                message: "card pool must hold at least one card".to_string(),
            });
        }
        if n_red > n_cards {
            return Err(ModelError::InvalidConfiguration { n_red, n_cards });
        }
        Ok(Self {
            n_cards,
            n_red,
            outcome,
            reward: None,
            violation: None,
        })
    }

    pub fn n_cards(&self) -> u32 {
        self.n_cards
    }

    pub fn n_red(&self) -> u32 {
        self.n_red
    }

    pub fn n_blue(&self) -> u32 {
        self.n_cards - self.n_red
    }

    pub fn outcome_value(&self) -> i64 {
        self.outcome
    }

    pub fn outcome(&self) -> Result<Colour, ModelError> {
        Colour::from_value(self.outcome)
    }

    /// Fraction of the pool showing `colour`.
    pub fn fraction(&self, colour: Colour) -> f64 {
        let count = match colour {
            Colour::Red => self.n_red,
            Colour::Blue => self.n_blue(),
        };
        count as f64 / self.n_cards as f64
    }

    /// Outcome scaled by the share of cards that would make an honest report of it.
    pub fn expectation(&self) -> Result<f64, ModelError> {
        let outcome = self.outcome()?;
        Ok(outcome.sign() * self.fraction(outcome))
    }

    /// Signed surprise: `outcome - expectation`.
    pub fn exp_violation(&self) -> Result<f64, ModelError> {
        let outcome = self.outcome()?;
        Ok(outcome.sign() - self.expectation()?)
    }

    /// Magnitude of surprise: one minus the share of cards matching the reported colour.
    pub fn unsigned_violation(&self) -> Result<f64, ModelError> {
        let outcome = self.outcome()?;
        Ok(1.0 - self.fraction(outcome))
    }

    /// The pool in deal order: all red cards first, then blue.
    pub fn cards(&self) -> Vec<Colour> {
        let mut cards = Vec::with_capacity(self.n_cards as usize);
        cards.extend(std::iter::repeat(Colour::Red).take(self.n_red as usize));
        cards.extend(std::iter::repeat(Colour::Blue).take(self.n_blue() as usize));
        cards
    }

    /// Deal the player's own card uniformly from the pool.
    pub fn selected_card<R: Rng + ?Sized>(&self, rng: &mut R) -> Colour {
        let index = rng.gen_range(0..self.n_cards);
        if index < self.n_red {
            Colour::Red
        } else {
            Colour::Blue
        }
    }

    pub fn attach_reward(&mut self, reward: i8) {
        self.reward = Some(reward);
    }

    pub fn reward(&self) -> Option<i8> {
        self.reward
    }

    pub fn attach_violation(&mut self, violation: f64) {
        self.violation = Some(violation);
    }

    pub fn recorded_violation(&self) -> Option<f64> {
        self.violation
    }
}

/// Trial description as it appears in input files: `{"n_red": 2, "outcome": 1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub n_red: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<i64>,
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

impl TrialSpec {
    pub fn new(n_red: u32, outcome: Option<i64>) -> Self {
        Self {
            n_red,
            outcome,
            extras: BTreeMap::new(),
        }
    }

    /// Parse a single record, failing fast on missing or mistyped required fields.
    pub fn from_value(value: &Value) -> Result<Self, ModelError> {
        let object = value.as_object().ok_or_else(|| ModelError::InvalidField {
            field: "trial".to_string(),
            message: "expected a JSON object".to_string(),
        })?;

        let n_red = object
            .get("n_red")
            .ok_or(ModelError::MissingField {
                record: "trial",
                field: "n_red",
            })
            .and_then(|raw| integer_field(raw, "n_red"))?;
        let n_red = u32::try_from(n_red).map_err(|_| ModelError::InvalidField {
            field: "n_red".to_string(),
            message: format!("{n_red} is not a card count"),
        })?;

        let outcome = match object.get("outcome") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(integer_field(raw, "outcome")?),
        };

        let extras = object
            .iter()
            .filter(|(key, _)| key.as_str() != "n_red" && key.as_str() != "outcome")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            n_red,
            outcome,
            extras,
        })
    }

    /// Parse a JSON array of trial records.
    pub fn parse_array(json: &str) -> Result<Vec<Self>, ModelError> {
        let value: Value = serde_json::from_str(json).map_err(|err| ModelError::InvalidField {
            field: "trials".to_string(),
            message: err.to_string(),
        })?;
        let Value::Array(items) = value else {
            return Err(ModelError::InvalidField {
                field: "trials".to_string(),
                message: "expected a JSON array of trial records".to_string(),
            });
        };
        items.iter().map(Self::from_value).collect()
    }

    /// Materialise the trial; an absent outcome is drawn from `rng`.
    pub fn resolve<R: Rng + ?Sized>(&self, n_cards: u32, rng: &mut R) -> Result<Trial, ModelError> {
        match self.outcome {
            Some(raw) => Trial::from_raw(n_cards, self.n_red, raw),
            None => Trial::with_pool(n_cards, self.n_red, None, rng),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("n_red".to_string(), Value::from(self.n_red));
        if let Some(outcome) = self.outcome {
            object.insert("outcome".to_string(), Value::from(outcome));
        }
        for (key, value) in &self.extras {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

fn integer_field(raw: &Value, field: &str) -> Result<i64, ModelError> {
    // Trial sheets exported from spreadsheets carry whole numbers as floats.
    if let Some(value) = raw.as_i64() {
        return Ok(value);
    }
    match raw.as_f64() {
        Some(value) if value.fract() == 0.0 => Ok(value as i64),
        _ => Err(ModelError::InvalidField {
            field: field.to_string(),
            message: format!("expected an integer, found {raw}"),
        }),
    }
}

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Card colour as reported on the table; red is -1 and blue is +1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i64")]
pub enum Colour {
    Red,
    Blue,
}

impl Colour {
    pub const ALL: [Colour; 2] = [Colour::Red, Colour::Blue];

    pub fn from_value(value: i64) -> Result<Self, ModelError> {
        match value {
            -1 => Ok(Colour::Red),
            1 => Ok(Colour::Blue),
            other => Err(ModelError::InvalidOutcome(other)),
        }
    }

    pub const fn value(self) -> i8 {
        match self {
            Colour::Red => -1,
            Colour::Blue => 1,
        }
    }

    pub const fn sign(self) -> f64 {
        match self {
            Colour::Red => -1.0,
            Colour::Blue => 1.0,
        }
    }

    pub const fn opposite(self) -> Colour {
        match self {
            Colour::Red => Colour::Blue,
            Colour::Blue => Colour::Red,
        }
    }
}

impl From<Colour> for i8 {
    fn from(colour: Colour) -> Self {
        colour.value()
    }
}

impl TryFrom<i64> for Colour {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Colour::from_value(value)
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Colour::Red => "red",
            Colour::Blue => "blue",
        };
        f.write_str(label)
    }
}

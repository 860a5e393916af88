//! Simulated lock hardware and its configuration.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by lock actions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("digit event without a digit payload")]
    MissingDigit,

    #[error("invalid digit {0}: expected 0-9")]
    InvalidDigit(u64),

    #[error("invalid combination character '{0}'")]
    InvalidCharacter(char),

    #[error("combination must not be empty")]
    EmptyCombination,
}

/// Lock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Stored combination, one digit per element.
    pub combination: Vec<u8>,

    /// Hardware flag read by the initial state.
    pub start_locked: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            combination: vec![0, 0, 0],
            start_locked: true,
        }
    }
}

impl LockConfig {
    /// Parses a combination written as digits, e.g. `"042"`.
    pub fn parse_combination(s: &str) -> Result<Vec<u8>, LockError> {
        let digits = s
            .trim()
            .chars()
            .map(|c| {
                c.to_digit(10)
                    .map(|d| d as u8)
                    .ok_or(LockError::InvalidCharacter(c))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if digits.is_empty() {
            return Err(LockError::EmptyCombination);
        }
        Ok(digits)
    }

    pub fn validate(&self) -> Result<(), LockError> {
        if self.combination.is_empty() {
            return Err(LockError::EmptyCombination);
        }
        if let Some(d) = self.combination.iter().find(|d| **d > 9) {
            return Err(LockError::InvalidDigit(u64::from(*d)));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Registers {
    locked: bool,
    combination: Vec<u8>,
    entered: Vec<u8>,
    pending: Vec<u8>,
    ignored: usize,
}

/// The lock's physical side: bolt, stored combination and keypad buffer.
#[derive(Debug)]
pub struct LockHardware {
    registers: Mutex<Registers>,
}

impl LockHardware {
    pub fn new(config: &LockConfig) -> Self {
        Self {
            registers: Mutex::new(Registers {
                locked: config.start_locked,
                combination: config.combination.clone(),
                entered: Vec::new(),
                pending: Vec::new(),
                ignored: 0,
            }),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.registers.lock().locked
    }

    pub fn set_locked(&self, locked: bool) {
        self.registers.lock().locked = locked;
    }

    pub fn combination(&self) -> Vec<u8> {
        self.registers.lock().combination.clone()
    }

    /// Digits entered since the lock last engaged.
    pub fn entered(&self) -> Vec<u8> {
        self.registers.lock().entered.clone()
    }

    pub fn clear_entered(&self) {
        self.registers.lock().entered.clear();
    }

    /// Records a keypad digit.
    ///
    /// Returns `Some(true)` once a full-length attempt matches the stored
    /// combination, `Some(false)` for a full-length miss (the buffer is
    /// cleared), and `None` while the attempt is incomplete.
    pub fn enter_digit(&self, digit: u8) -> Option<bool> {
        let mut regs = self.registers.lock();
        regs.entered.push(digit);
        if regs.entered.len() < regs.combination.len() {
            return None;
        }
        let matched = regs.entered == regs.combination;
        regs.entered.clear();
        Some(matched)
    }

    pub fn begin_combination(&self) {
        self.registers.lock().pending.clear();
    }

    /// Records a digit of a new combination. Commits and returns true once
    /// it is as long as the current one.
    pub fn record_combination_digit(&self, digit: u8) -> bool {
        let mut regs = self.registers.lock();
        regs.pending.push(digit);
        if regs.pending.len() < regs.combination.len() {
            return false;
        }
        regs.combination = std::mem::take(&mut regs.pending);
        true
    }

    pub fn record_ignored(&self) {
        self.registers.lock().ignored += 1;
    }

    /// Number of inputs the unlocked state ignored.
    pub fn ignored(&self) -> usize {
        self.registers.lock().ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_digit_match_and_miss() {
        let hw = LockHardware::new(&LockConfig {
            combination: vec![1, 2],
            start_locked: true,
        });

        assert_eq!(hw.enter_digit(1), None);
        assert_eq!(hw.enter_digit(3), Some(false));
        assert!(hw.entered().is_empty());

        assert_eq!(hw.enter_digit(1), None);
        assert_eq!(hw.enter_digit(2), Some(true));
    }

    #[test]
    fn test_record_combination() {
        let hw = LockHardware::new(&LockConfig::default());
        hw.begin_combination();
        assert!(!hw.record_combination_digit(4));
        assert!(!hw.record_combination_digit(5));
        assert!(hw.record_combination_digit(6));
        assert_eq!(hw.combination(), vec![4, 5, 6]);
    }

    #[test]
    fn test_parse_combination() {
        assert_eq!(LockConfig::parse_combination("042"), Ok(vec![0, 4, 2]));
        assert_eq!(
            LockConfig::parse_combination(""),
            Err(LockError::EmptyCombination)
        );
        assert_eq!(
            LockConfig::parse_combination("4a"),
            Err(LockError::InvalidCharacter('a'))
        );
    }

    #[test]
    fn test_validate() {
        assert!(LockConfig::default().validate().is_ok());
        let config = LockConfig {
            combination: vec![1, 12],
            start_locked: false,
        };
        assert_eq!(config.validate(), Err(LockError::InvalidDigit(12)));
    }
}

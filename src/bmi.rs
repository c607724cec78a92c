use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Healthy,
    Overweight,
    Obese,
}

impl BmiCategory {
    /// Classifies an already rounded BMI value.
    pub fn classify(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::Healthy
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Healthy => "Healthy",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obese => "Obese",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => {
                "BMI below the healthy range. Consider a nutrient-dense diet and consult a professional if needed."
            }
            BmiCategory::Healthy => "Within the healthy range. Keep up a balanced diet and exercise.",
            BmiCategory::Overweight => {
                "Slightly above the healthy range. Consider lifestyle adjustments."
            }
            BmiCategory::Obese => "BMI indicates obesity. Consider seeking professional guidance.",
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BmiCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Underweight" => Ok(BmiCategory::Underweight),
            "Healthy" => Ok(BmiCategory::Healthy),
            "Overweight" => Ok(BmiCategory::Overweight),
            "Obese" => Ok(BmiCategory::Obese),
            _ => Err(AppError::Validation(format!("Unknown BMI category: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BmiResult {
    pub bmi: f64,
    pub category: BmiCategory,
}

/// Computes BMI from a weight in kilograms and a height in centimetres,
/// rounded to one decimal place and classified on the rounded value.
pub fn compute_bmi(weight: f64, height_cm: f64) -> Result<BmiResult, AppError> {
    if !weight.is_finite() || !height_cm.is_finite() || weight <= 0.0 || height_cm <= 0.0 {
        return Err(AppError::Validation(
            "Weight and height must be positive numbers".to_string(),
        ));
    }

    let height_m = height_cm / 100.0;
    let bmi = round_one_decimal(weight / (height_m * height_m));

    Ok(BmiResult {
        bmi,
        category: BmiCategory::classify(bmi),
    })
}

/// Rounds the exact binary value to one decimal. Scaling by ten first would
/// round the product instead, pushing e.g. 24.95 (stored as 24.9499...) up
/// to 25.0.
fn round_one_decimal(value: f64) -> f64 {
    format!("{:.1}", value).parse().unwrap_or(value)
}

/// A numeric field as clients actually send it: either a JSON number or a
/// string holding one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

/// Reads a required numeric field, failing with a validation error naming it.
pub fn require_number(value: Option<&Numeric>, field: &str) -> Result<f64, AppError> {
    value
        .and_then(Numeric::to_f64)
        .filter(|n| n.is_finite())
        .ok_or_else(|| AppError::Validation(format!("{} must be a number", field)))
}

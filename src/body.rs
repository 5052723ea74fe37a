//! Body composition helpers: BMI and daily calorie needs (Harris-Benedict).

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::metrics::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    #[default]
    Light,
    Moderate,
    Intense,
    VeryIntense,
}

impl ActivityLevel {
    pub fn factor(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::Intense => 1.725,
            Self::VeryIntense => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            Self::Underweight
        } else if bmi < 25.0 {
            Self::Normal
        } else if bmi < 30.0 {
            Self::Overweight
        } else {
            Self::Obese
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BodyProfile {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age: u32,
    pub sex: Sex,
    #[serde(default)]
    pub activity_level: ActivityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyAssessment {
    pub bmi: f64,
    pub bmi_category: BmiCategory,
    pub daily_calories: u32,
}

/// kg / m², rounded to two decimals
pub fn bmi(weight_kg: f64, height_cm: f64) -> Result<f64> {
    if !(weight_kg.is_finite() && weight_kg > 0.0) {
        return Err(AnalyticsError::invalid_input("weight_kg must be positive"));
    }
    if !(height_cm.is_finite() && height_cm > 0.0) {
        return Err(AnalyticsError::invalid_input("height_cm must be positive"));
    }
    let height_m = height_cm / 100.0;
    Ok(round_to(weight_kg / (height_m * height_m), 2))
}

pub fn daily_calorie_needs(profile: &BodyProfile) -> Result<u32> {
    bmi(profile.weight_kg, profile.height_cm)?;
    let age = f64::from(profile.age);
    let bmr = match profile.sex {
        Sex::Male => 88.362 + 13.397 * profile.weight_kg + 4.799 * profile.height_cm - 5.677 * age,
        Sex::Female => {
            447.593 + 9.247 * profile.weight_kg + 3.098 * profile.height_cm - 4.330 * age
        }
    };
    Ok((bmr * profile.activity_level.factor()).max(0.0) as u32)
}

pub fn assess(profile: &BodyProfile) -> Result<BodyAssessment> {
    let bmi = bmi(profile.weight_kg, profile.height_cm)?;
    Ok(BodyAssessment {
        bmi,
        bmi_category: BmiCategory::from_bmi(bmi),
        daily_calories: daily_calorie_needs(profile)?,
    })
}

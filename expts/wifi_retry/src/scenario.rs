use std::{fs, path::Path};

use wifitrace::series::MODEL_STAGES;

/// A named set of per-attempt drop rates to simulate.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimScenario {
    pub name: String,
    pub drop_rates: Vec<f64>,
}

impl SimScenario {
    /// Far from the access point: almost every first attempt fails.
    pub fn far() -> Self {
        Self {
            name: "sim_far".into(),
            drop_rates: vec![1.0, 0.99, 0.25, 0.5, 0.625, 0.8, 0.08, 0.0, 0.0, 0.0],
        }
    }

    pub fn mid() -> Self {
        Self {
            name: "sim_mid".into(),
            drop_rates: vec![1.0, 0.6125, 0.42, 0.4, 0.45, 0.8, 0.05, 0.0, 0.0, 0.0],
        }
    }

    pub fn near() -> Self {
        Self {
            name: "sim_near".into(),
            drop_rates: vec![0.99, 0.3, 0.125, 0.04, 0.5, 0.25, 0.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn stock() -> Vec<Self> {
        vec![Self::far(), Self::mid(), Self::near()]
    }

    /// Reads a JSON array of scenarios.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Self>, ScenarioError> {
        let scenarios: Vec<Self> = serde_json::from_str(&fs::read_to_string(path)?)?;
        for scenario in &scenarios {
            scenario.validate()?;
        }
        Ok(scenarios)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.drop_rates.len() > MODEL_STAGES {
            return Err(ScenarioError::TooManyStages {
                name: self.name.clone(),
                got: self.drop_rates.len(),
            });
        }
        if let Some(&rate) = self.drop_rates.iter().find(|r| !(0.0..=1.0).contains(*r)) {
            return Err(ScenarioError::InvalidRate {
                name: self.name.clone(),
                rate,
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("scenario {name} has {got} stages (at most {MODEL_STAGES})")]
    TooManyStages { name: String, got: usize },

    #[error("scenario {name} has drop rate {rate} outside [0, 1]")]
    InvalidRate { name: String, rate: f64 },

    #[error("invalid scenario file")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_serde() {
        let data = r#"[{"name":"sim_lab","drop_rates":[0.5,0.1]}]"#;
        let scenarios = serde_json::from_str::<Vec<SimScenario>>(data).unwrap();
        assert_eq!(scenarios[0].name, "sim_lab");
        assert_eq!(scenarios[0].drop_rates, vec![0.5, 0.1]);
    }

    #[test]
    fn stock_scenarios_are_valid() {
        for scenario in SimScenario::stock() {
            scenario.validate().unwrap();
        }
    }

    #[test]
    fn rejects_bad_scenarios() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scenarios.json");
        let long = SimScenario {
            name: "long".into(),
            drop_rates: vec![0.1; MODEL_STAGES + 1],
        };
        fs::write(&path, serde_json::to_string(&[long])?)?;
        assert!(matches!(
            SimScenario::load(&path),
            Err(ScenarioError::TooManyStages { got: 11, .. })
        ));
        fs::write(&path, r#"[{"name":"neg","drop_rates":[0.1,-0.2]}]"#)?;
        assert!(matches!(
            SimScenario::load(&path),
            Err(ScenarioError::InvalidRate { .. })
        ));
        Ok(())
    }

    #[test]
    fn load_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scenarios.json");
        fs::write(&path, serde_json::to_string(&SimScenario::stock())?)?;
        assert_eq!(SimScenario::load(&path)?, SimScenario::stock());
        Ok(())
    }
}

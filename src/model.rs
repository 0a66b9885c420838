//! Analysis model - named materials, boundary cases and analyses

use std::collections::{BTreeMap, HashMap};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::{Analysis, AnalysisCase, AnalysisState};
use crate::error::{FEAError, FEAResult};
use crate::loads::BoundaryCase;
use crate::materials::Material;
use crate::results::{AnalysisFailure, AnalysisResult};
use crate::system::StructuralSystem;

/// Registry of everything an analysis run refers to by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisModel {
    /// Materials handed to the element layer
    #[serde(default)]
    materials: HashMap<String, Material>,
    #[serde(default)]
    boundary_cases: BTreeMap<String, BoundaryCase>,
    /// Analyses in name order; results are not serialized
    #[serde(default)]
    analyses: BTreeMap<String, Analysis>,
}

impl AnalysisModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================
    // Model Building Methods
    // ========================

    /// Add a material to the model
    pub fn add_material(&mut self, name: &str, material: impl Into<Material>) -> FEAResult<()> {
        if self.materials.contains_key(name) {
            return Err(FEAError::DuplicateName(name.to_string()));
        }
        self.materials.insert(name.to_string(), material.into());
        Ok(())
    }

    pub fn material(&self, name: &str) -> FEAResult<&Material> {
        self.materials
            .get(name)
            .ok_or_else(|| FEAError::MaterialNotFound(name.to_string()))
    }

    /// Add a boundary case under its own name
    pub fn add_boundary_case(&mut self, case: BoundaryCase) -> FEAResult<()> {
        let name = case.name().to_string();
        if self.boundary_cases.contains_key(&name) {
            return Err(FEAError::DuplicateName(name));
        }
        self.boundary_cases.insert(name.clone(), case);
        self.invalidate(&name);
        Ok(())
    }

    /// Replace an existing boundary case; analyses using it lose their results
    pub fn replace_boundary_case(&mut self, case: BoundaryCase) -> FEAResult<()> {
        let name = case.name().to_string();
        match self.boundary_cases.get_mut(&name) {
            Some(slot) => *slot = case,
            None => return Err(FEAError::BoundaryCaseNotFound(name)),
        }
        self.invalidate(&name);
        Ok(())
    }

    pub fn boundary_case(&self, name: &str) -> FEAResult<&BoundaryCase> {
        self.boundary_cases
            .get(name)
            .ok_or_else(|| FEAError::BoundaryCaseNotFound(name.to_string()))
    }

    /// Add an analysis case; it starts Configured or Unconfigured
    pub fn add_analysis(&mut self, case: AnalysisCase) -> FEAResult<()> {
        if self.analyses.contains_key(&case.name) {
            return Err(FEAError::DuplicateName(case.name));
        }
        let analysis = Analysis::new(case)?;
        self.analyses.insert(analysis.name().to_string(), analysis);
        Ok(())
    }

    pub fn analysis(&self, name: &str) -> FEAResult<&Analysis> {
        self.analyses
            .get(name)
            .ok_or_else(|| FEAError::AnalysisNotFound(name.to_string()))
    }

    /// Mutable access for reconfiguring an analysis
    pub fn analysis_mut(&mut self, name: &str) -> FEAResult<&mut Analysis> {
        self.analyses
            .get_mut(name)
            .ok_or_else(|| FEAError::AnalysisNotFound(name.to_string()))
    }

    fn invalidate(&mut self, boundary_case: &str) {
        for analysis in self.analyses.values_mut() {
            let uses = analysis
                .case()
                .boundary_cases
                .iter()
                .any(|r| r.case == boundary_case);
            if uses && analysis.state() != AnalysisState::Configured {
                analysis.reset();
            }
        }
    }

    // ========================
    // Analysis
    // ========================

    /// Solve one analysis against the assembled system
    ///
    /// A previously solved or failed analysis is reset and solved again.
    pub fn run(&mut self, name: &str, system: &StructuralSystem) -> FEAResult<&AnalysisResult> {
        let analysis = self
            .analyses
            .get_mut(name)
            .ok_or_else(|| FEAError::AnalysisNotFound(name.to_string()))?;
        if matches!(
            analysis.state(),
            AnalysisState::Solved | AnalysisState::Failed
        ) {
            analysis.reset();
        }
        analysis.run(&self.boundary_cases, system)
    }

    /// Solve every configured analysis; failures stay local to their analysis
    pub fn run_all(&mut self, system: &StructuralSystem) -> BTreeMap<String, AnalysisState> {
        let mut states = BTreeMap::new();
        for (name, analysis) in self.analyses.iter_mut() {
            if analysis.state() != AnalysisState::Unconfigured {
                analysis.reset();
                if let Err(err) = analysis.run(&self.boundary_cases, system) {
                    warn!("analysis '{}' failed: {}", name, err);
                }
            }
            states.insert(name.clone(), analysis.state());
        }
        let solved = states
            .values()
            .filter(|s| **s == AnalysisState::Solved)
            .count();
        info!("{} of {} analyses solved", solved, states.len());
        states
    }

    pub fn status(&self, name: &str) -> FEAResult<AnalysisState> {
        Ok(self.analysis(name)?.state())
    }

    pub fn result(&self, name: &str) -> FEAResult<&AnalysisResult> {
        self.analysis(name)?
            .result()
            .ok_or_else(|| FEAError::NotAnalyzed(name.to_string()))
    }

    pub fn failure(&self, name: &str) -> FEAResult<Option<&AnalysisFailure>> {
        Ok(self.analysis(name)?.failure())
    }

    /// Get all analysis names
    pub fn analysis_names(&self) -> Vec<String> {
        self.analyses.keys().cloned().collect()
    }

    /// Get all material names, sorted
    pub fn material_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.materials.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get all boundary case names
    pub fn boundary_case_names(&self) -> Vec<String> {
        self.boundary_cases.keys().cloned().collect()
    }

    // ========================
    // Serialization
    // ========================

    pub fn from_json(json: &str) -> FEAResult<Self> {
        let model: Self = serde_json::from_str(json)?;
        for (key, case) in &model.boundary_cases {
            if key != case.name() {
                return Err(FEAError::incompatible(format!(
                    "boundary case stored as '{}' is named '{}'",
                    key,
                    case.name()
                )));
            }
        }
        for (key, analysis) in &model.analyses {
            if key != analysis.name() {
                return Err(FEAError::incompatible(format!(
                    "analysis stored as '{}' is named '{}'",
                    key,
                    analysis.name()
                )));
            }
        }
        Ok(model)
    }

    pub fn to_json(&self) -> FEAResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

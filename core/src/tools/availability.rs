//! The two availability lookups exposed to the model.
//!
//! Both read the [`SlotStore`] attached to the client as state, so the table is reloaded on
//! every call.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ExecutionStrategy, Tool, ToolArg, ToolError, ToolSet};
use crate::{
    completion::{state_from, State, StateMap},
    slots::{Doctor, SlotDate, SlotStore, Specialization},
};

/// Properly formatted date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateArg {
    /// Date in the format DD-MM-YYYY
    #[schemars(regex(pattern = r"^\d{2}-\d{2}-\d{4}$"))]
    pub date: String,
}

impl DateArg {
    fn validate(&self) -> Result<SlotDate, ToolError> {
        Ok(SlotDate::parse(&self.date)?)
    }
}

/// Tools this crate can bind to a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvailabilityTool {
    #[serde(rename = "check_availability_by_doctor")]
    ByDoctor,
    #[serde(rename = "check_availability_by_specialization")]
    BySpecialization,
}

impl AvailabilityTool {
    pub const ALL: [AvailabilityTool; 2] = [Self::ByDoctor, Self::BySpecialization];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ByDoctor => "check_availability_by_doctor",
            Self::BySpecialization => "check_availability_by_specialization",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    #[must_use]
    pub fn build(&self) -> Box<dyn Tool> {
        match self {
            Self::ByDoctor => Box::new(AvailabilityByDoctorTool::new()),
            Self::BySpecialization => Box::new(AvailabilityBySpecializationTool::new()),
        }
    }
}

/// Builds a `ToolSet` with the selected tools, each at most once, in selection order
#[must_use]
pub fn availability_tools(selection: &[AvailabilityTool], strategy: ExecutionStrategy) -> ToolSet {
    let mut set = ToolSet(vec![], strategy);
    for tool in selection {
        if set.find_tool(tool.name()).is_err() {
            set.add_tool(tool.build());
        }
    }
    set
}

pub struct AvailabilityByDoctorTool {
    args: Vec<ToolArg>,
}

impl AvailabilityByDoctorTool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            args: vec![
                ToolArg::new::<DateArg>("desired_date", "The date the user asked about"),
                ToolArg::new::<Doctor>("doctor_name", "The doctor the user asked about"),
            ],
        }
    }
}

impl Default for AvailabilityByDoctorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AvailabilityByDoctorTool {
    fn name(&self) -> &str {
        AvailabilityTool::ByDoctor.name()
    }

    fn description(&self) -> &str {
        "Checking the database if we have availability for the specific doctor. \
         The parameters should be mentioned by the user in the query"
    }

    fn args(&self) -> &[ToolArg] {
        &self.args
    }

    async fn call(&self, args: &str, states: &StateMap) -> Result<Value, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            desired_date: DateArg,
            doctor_name: Doctor,
        }
        let params: Params = serde_json::from_str(args)?;
        let date = params.desired_date.validate()?;
        let State(store) = state_from::<SlotStore>(states)?;
        Ok(Value::from(store.by_doctor(&date, params.doctor_name)?))
    }
}

pub struct AvailabilityBySpecializationTool {
    args: Vec<ToolArg>,
}

impl AvailabilityBySpecializationTool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            args: vec![
                ToolArg::new::<DateArg>("desired_date", "The date the user asked about"),
                ToolArg::new::<Specialization>(
                    "specialization",
                    "The kind of dentist the user asked about",
                ),
            ],
        }
    }
}

impl Default for AvailabilityBySpecializationTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AvailabilityBySpecializationTool {
    fn name(&self) -> &str {
        AvailabilityTool::BySpecialization.name()
    }

    fn description(&self) -> &str {
        "Checking the database if we have availability for the specific specialization. \
         The parameters should be mentioned by the user in the query"
    }

    fn args(&self) -> &[ToolArg] {
        &self.args
    }

    async fn call(&self, args: &str, states: &StateMap) -> Result<Value, ToolError> {
        #[derive(Deserialize)]
        struct Params {
            desired_date: DateArg,
            specialization: Specialization,
        }
        let params: Params = serde_json::from_str(args)?;
        let date = params.desired_date.validate()?;
        let State(store) = state_from::<SlotStore>(states)?;
        Ok(Value::from(
            store.by_specialization(&date, params.specialization)?,
        ))
    }
}

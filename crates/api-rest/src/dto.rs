//! Request and response bodies for the REST API.
//!
//! Responses are a view model over [`FlowPatient`]: optional department and doctor are sent
//! both raw (`null` when missing) and as a display label with the shared default applied.

use flow_core::display::or_unassigned;
use flow_core::{FlowEvent, FlowPatient, Stage};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageRes {
    pub stage: String,
    pub label: String,
    pub terminal: bool,
}

impl From<Stage> for StageRes {
    fn from(stage: Stage) -> Self {
        Self {
            stage: stage.as_str().into(),
            label: stage.label().into(),
            terminal: stage.is_terminal(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlowEventRes {
    pub stage: String,
    pub stage_label: String,
    pub action: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub notes: Option<String>,
}

impl From<&FlowEvent> for FlowEventRes {
    fn from(event: &FlowEvent) -> Self {
        Self {
            stage: event.stage().as_str().into(),
            stage_label: event.stage().label().into(),
            action: event.action().into(),
            timestamp: event.timestamp().to_rfc3339(),
            notes: event.notes().map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientRes {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub current_stage: String,
    pub current_stage_label: String,
    pub consultation_department: Option<String>,
    pub consultation_department_label: String,
    pub assigned_doctor: Option<String>,
    pub assigned_doctor_label: String,
    pub tests: Vec<String>,
    pub prescriptions: Vec<String>,
    pub history: Vec<FlowEventRes>,
}

impl From<&FlowPatient> for PatientRes {
    fn from(patient: &FlowPatient) -> Self {
        Self {
            id: patient.id().to_string(),
            name: patient.name().into(),
            email: patient.email().map(|e| e.as_str().into()),
            current_stage: patient.current_stage().as_str().into(),
            current_stage_label: patient.current_stage().label().into(),
            consultation_department: patient.consultation_department().map(Into::into),
            consultation_department_label: or_unassigned(patient.consultation_department())
                .into(),
            assigned_doctor: patient.assigned_doctor().map(Into::into),
            assigned_doctor_label: or_unassigned(patient.assigned_doctor()).into(),
            tests: patient.tests().map(Into::into).collect(),
            prescriptions: patient.prescriptions().map(Into::into).collect(),
            history: patient.history().iter().map(FlowEventRes::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<PatientRes>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPatientsQuery {
    /// Only return patients currently at this stage.
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterPatientReq {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MoveStageReq {
    pub stage: String,
    pub action: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignDepartmentReq {
    pub department: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignDoctorReq {
    pub doctor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddTestResultReq {
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddPrescriptionReq {
    pub prescription: String,
}

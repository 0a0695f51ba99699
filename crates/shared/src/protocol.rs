use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AmenityId, BillingCycle, ComplaintId, ComplaintStatus, MemberId, NoticeId, PaymentId,
    PaymentStatus, Role, SocietyId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub mobile: String,
    pub flat_number: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub society_id: Option<SocietyId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Registration {
    Registered { resident: ResidentView },
    AwaitingApproval { applicant: ApplicantView },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub mobile: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub resident: ResidentView,
}

/// A confirmed member. The credential hash never leaves the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentView {
    pub id: MemberId,
    pub full_name: String,
    pub mobile_number: String,
    pub email: Option<String>,
    pub flat_number: String,
    pub role: Role,
    pub society_id: Option<SocietyId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantView {
    pub id: MemberId,
    pub full_name: String,
    pub mobile_number: String,
    pub flat_number: String,
    pub role: Role,
    pub society_id: Option<SocietyId>,
    pub created_at: DateTime<Utc>,
}

/// Allow-listed resident fields a secretary may change. Unknown keys are
/// rejected instead of being written through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResidentPatch {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub flat_number: Option<String>,
}

impl ResidentPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.flat_number.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocietyDetailsRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub upi_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocietyView {
    pub id: SocietyId,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
    pub registration_number: Option<String>,
    pub upi_id: Option<String>,
    pub secretary_id: MemberId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSettingsRequest {
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub billing_cycle: Option<BillingCycle>,
    #[serde(default)]
    pub due_day: Option<u8>,
    #[serde(default)]
    pub upi_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceView {
    pub society_id: SocietyId,
    pub amount: Option<i64>,
    pub billing_cycle: Option<BillingCycle>,
    pub due_day: Option<u8>,
    pub upi_id: Option<String>,
}

/// Days and slots arrive either as a JSON array or as a comma separated
/// string ("Mon, Tue").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListInput {
    Items(Vec<String>),
    Csv(String),
}

impl Default for ListInput {
    fn default() -> Self {
        Self::Items(Vec::new())
    }
}

impl ListInput {
    pub fn into_items(self) -> Vec<String> {
        let raw = match self {
            ListInput::Items(items) => items,
            ListInput::Csv(text) => text.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmenityInput {
    pub name: String,
    #[serde(default)]
    pub allowed_days: ListInput,
    #[serde(default)]
    pub time_slots: ListInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAmenitiesRequest {
    pub amenities: Vec<AmenityInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmenityView {
    pub id: AmenityId,
    pub society_id: SocietyId,
    pub name: String,
    pub allowed_days: Vec<String>,
    pub time_slots: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupDetails {
    pub has_society_details: bool,
    pub has_maintenance_settings: bool,
    pub has_amenities: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatus {
    pub is_setup_complete: bool,
    pub details: SetupDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub resident_id: MemberId,
    pub society_id: SocietyId,
    pub amount: i64,
    pub period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusUpdate {
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: PaymentId,
    pub resident_id: MemberId,
    pub society_id: SocietyId,
    pub amount: i64,
    pub period: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPaymentView {
    pub id: PaymentId,
    pub resident_id: MemberId,
    pub full_name: String,
    pub flat_number: String,
    pub amount: i64,
    pub period: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeView {
    pub id: NoticeId,
    pub society_id: SocietyId,
    pub title: String,
    pub content: String,
    pub posted_by: MemberId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintRequest {
    pub category: String,
    pub subject: String,
    pub description: String,
    #[serde(default)]
    pub preferred_time: Option<String>,
    #[serde(default)]
    pub urgent: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComplaintPatch {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preferred_time: Option<String>,
    #[serde(default)]
    pub urgent: Option<bool>,
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
}

impl ComplaintPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && !self.touches_content()
    }

    /// True when any author-owned field is set.
    pub fn touches_content(&self) -> bool {
        self.category.is_some()
            || self.subject.is_some()
            || self.description.is_some()
            || self.preferred_time.is_some()
            || self.urgent.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintView {
    pub id: ComplaintId,
    pub resident_id: MemberId,
    pub society_id: SocietyId,
    pub category: String,
    pub subject: String,
    pub description: String,
    pub preferred_time: Option<String>,
    pub urgent: bool,
    pub status: ComplaintStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_input_accepts_csv_and_arrays() {
        let csv: AmenityInput = serde_json::from_value(serde_json::json!({
            "name": "Gym",
            "allowedDays": "Mon, Tue,, Wed ",
            "timeSlots": ["06:00-08:00", "  "],
        }))
        .expect("amenity");
        assert_eq!(csv.allowed_days.into_items(), vec!["Mon", "Tue", "Wed"]);
        assert_eq!(csv.time_slots.into_items(), vec!["06:00-08:00"]);
    }

    #[test]
    fn resident_patch_rejects_columns_outside_the_allow_list() {
        let err = serde_json::from_value::<ResidentPatch>(serde_json::json!({
            "fullName": "New Name",
            "role": "secretary",
        }))
        .expect_err("role is not patchable");
        assert!(err.to_string().contains("role"));
    }

    #[test]
    fn setup_status_uses_camel_case_wire_names() {
        let status = SetupStatus {
            is_setup_complete: false,
            details: SetupDetails::default(),
        };
        let value = serde_json::to_value(status).expect("json");
        assert_eq!(value["isSetupComplete"], false);
        assert_eq!(value["details"]["hasMaintenanceSettings"], false);
    }
}

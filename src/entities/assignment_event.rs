use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::product::ProductCondition;

/// Ledger event kind
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    #[sea_orm(string_value = "delivery")]
    Delivery,
    #[sea_orm(string_value = "loan")]
    Loan,
    #[sea_orm(string_value = "repair")]
    Repair,
    #[sea_orm(string_value = "return")]
    Return,
    #[sea_orm(string_value = "repair_completed")]
    RepairCompleted,
}

impl EventKind {
    /// Kinds that stay open until a closing event is appended
    pub const OPENING: [EventKind; 3] = [EventKind::Delivery, EventKind::Loan, EventKind::Repair];

    pub fn is_opening(&self) -> bool {
        Self::OPENING.contains(self)
    }

    /// Delivery and loan hand the product to a person
    pub fn is_assignment(&self) -> bool {
        matches!(self, Self::Delivery | Self::Loan)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivery => "Delivery",
            Self::Loan => "Loan",
            Self::Repair => "Repair",
            Self::Return => "Return",
            Self::RepairCompleted => "Repair completed",
        }
    }
}

/// Why a product came back
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReturnReason {
    #[sea_orm(string_value = "employee_change")]
    EmployeeChange,
    #[sea_orm(string_value = "fault")]
    Fault,
    #[sea_orm(string_value = "obsolete")]
    Obsolete,
    #[sea_orm(string_value = "upgrade")]
    Upgrade,
    #[sea_orm(string_value = "contract_end")]
    ContractEnd,
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "theft_or_loss")]
    TheftOrLoss,
    #[sea_orm(string_value = "other")]
    Other,
}

impl ReturnReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmployeeChange => "Employee change",
            Self::Fault => "Fault",
            Self::Obsolete => "Obsolete",
            Self::Upgrade => "Upgrade",
            Self::ContractEnd => "Contract end",
            Self::Transfer => "Transfer",
            Self::TheftOrLoss => "Theft or loss",
            Self::Other => "Other",
        }
    }
}

/// Append-oriented ledger row
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "assignment_events")]
#[schema(as = AssignmentEvent)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub kind: EventKind,
    pub opened_at: DateTime<Utc>,
    pub expected_end: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub condition_at_open: ProductCondition,
    pub condition_at_close: Option<ProductCondition>,
    pub return_reason: Option<ReturnReason>,
    pub notes_open: Option<String>,
    pub notes_close: Option<String>,
    pub opened_by: String,
    pub closed_by: Option<String>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// On closing rows, the opening row being closed
    pub closes_event_id: Option<Uuid>,
    pub voided: bool,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_open(&self) -> bool {
        self.kind.is_opening() && self.closed_at.is_none()
    }

    /// Open loan whose expected end has passed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.kind == EventKind::Loan
            && self.is_open()
            && self.expected_end.map(|end| end < now).unwrap_or(false)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::employee::Entity",
        from = "Column::EmployeeId",
        to = "super::employee::Column::Id"
    )]
    Employee,
    #[sea_orm(
        belongs_to = "super::department::Entity",
        from = "Column::DepartmentId",
        to = "super::department::Column::Id"
    )]
    Department,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

impl Related<super::department::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Department.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            if let ActiveValue::NotSet = active_model.acknowledged {
                active_model.acknowledged = Set(false);
            }
            if let ActiveValue::NotSet = active_model.voided {
                active_model.voided = Set(false);
            }
            active_model.created_at = Set(Utc::now());
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(expected_end: Option<DateTime<Utc>>) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            employee_id: Some(Uuid::new_v4()),
            department_id: Some(Uuid::new_v4()),
            kind: EventKind::Loan,
            opened_at: now - Duration::days(10),
            expected_end,
            closed_at: None,
            condition_at_open: ProductCondition::UsedGood,
            condition_at_close: None,
            return_reason: None,
            notes_open: None,
            notes_close: None,
            opened_by: "tester".into(),
            closed_by: None,
            acknowledged: false,
            acknowledged_at: None,
            closes_event_id: None,
            voided: false,
            created_at: now,
        }
    }

    #[test]
    fn only_opening_kinds_can_be_open() {
        let mut event = loan(None);
        assert!(event.is_open());

        event.kind = EventKind::Return;
        assert!(!event.is_open());

        event.kind = EventKind::Repair;
        event.closed_at = Some(Utc::now());
        assert!(!event.is_open());
    }

    #[test]
    fn overdue_requires_open_loan_past_expected_end() {
        let now = Utc::now();
        assert!(loan(Some(now - Duration::days(1))).is_overdue(now));
        assert!(!loan(Some(now + Duration::days(1))).is_overdue(now));
        assert!(!loan(None).is_overdue(now));

        let mut delivery = loan(Some(now - Duration::days(1)));
        delivery.kind = EventKind::Delivery;
        assert!(!delivery.is_overdue(now));
    }
}

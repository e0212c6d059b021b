//! Assignment ledger.
//!
//! Every state change of a product is a new row. Delivery, loan and repair
//! rows stay open until a closing row (return or repair completed) is
//! appended; closing stamps `closed_at` on the opening row and nothing else
//! about it changes afterwards. A product has at most one open row, which is
//! guarded here and by the partial unique index `ux_assignment_events_open`.

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::{sync::Arc, time::Instant};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{self, DbPool},
    entities::{
        assignment_event, department, employee, product, EventKind, MovementKind,
        ProductCondition, ProductStatus, ReturnReason,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        optional_text,
        products::{end_of_day, find_product, record_movement, start_of_day, Movement},
        Page, PageRequest,
    },
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OpenAssignment {
    pub product_id: Uuid,
    pub employee_id: Uuid,
    /// Defaults to the employee's department
    pub department_id: Option<Uuid>,
    /// `delivery` or `loan`
    pub kind: EventKind,
    /// Defaults to now
    pub opened_at: Option<DateTime<Utc>>,
    /// Required for loans
    pub expected_end: Option<DateTime<Utc>>,
    /// Defaults to the product's current condition
    pub condition: Option<ProductCondition>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CloseAssignment {
    /// Defaults to now
    pub closed_at: Option<DateTime<Utc>>,
    pub condition: ProductCondition,
    pub reason: ReturnReason,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RepairRequest {
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CompleteRepair {
    pub condition: ProductCondition,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct VoidRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventQuery {
    pub product_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub kind: Option<EventKind>,
    /// Only delivery, loan and repair rows that are still open
    pub open_only: Option<bool>,
    /// Opened on or after this date
    pub from: Option<chrono::NaiveDate>,
    /// Opened on or before this date
    pub to: Option<chrono::NaiveDate>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Open event of a product, if any
pub(crate) async fn open_event<C>(
    conn: &C,
    product_id: Uuid,
) -> Result<Option<assignment_event::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(assignment_event::Entity::find()
        .filter(assignment_event::Column::ProductId.eq(product_id))
        .filter(assignment_event::Column::ClosedAt.is_null())
        .filter(assignment_event::Column::Kind.is_in(EventKind::OPENING))
        .order_by_desc(assignment_event::Column::OpenedAt)
        .one(conn)
        .await?)
}

/// Filtered ledger select, shared with the reports
pub(crate) fn filter_events(query: &EventQuery) -> sea_orm::Select<assignment_event::Entity> {
    let mut select = assignment_event::Entity::find();

    if let Some(id) = query.product_id {
        select = select.filter(assignment_event::Column::ProductId.eq(id));
    }
    if let Some(id) = query.employee_id {
        select = select.filter(assignment_event::Column::EmployeeId.eq(id));
    }
    if let Some(id) = query.department_id {
        select = select.filter(assignment_event::Column::DepartmentId.eq(id));
    }
    if let Some(kind) = query.kind {
        select = select.filter(assignment_event::Column::Kind.eq(kind));
    }
    if query.open_only.unwrap_or(false) {
        select = select
            .filter(assignment_event::Column::ClosedAt.is_null())
            .filter(assignment_event::Column::Kind.is_in(EventKind::OPENING));
    }
    if let Some(from) = query.from {
        select = select.filter(assignment_event::Column::OpenedAt.gte(start_of_day(from)));
    }
    if let Some(to) = query.to {
        select = select.filter(assignment_event::Column::OpenedAt.lt(end_of_day(to)));
    }
    select
}

/// Closing data applied to an open row
struct Closure {
    kind: EventKind,
    at: DateTime<Utc>,
    condition: ProductCondition,
    reason: Option<ReturnReason>,
    notes: Option<String>,
}

/// Append-only ledger of deliveries, loans, returns and repairs
#[derive(Clone)]
pub struct AssignmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl AssignmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Hands an available product to an employee
    #[instrument(skip(self, input), fields(product_id = %input.product_id, kind = %input.kind))]
    pub async fn open_assignment(
        &self,
        input: OpenAssignment,
        actor: &str,
    ) -> Result<assignment_event::Model, ServiceError> {
        input.validate()?;
        if !input.kind.is_assignment() {
            return Err(ServiceError::InvalidInput(format!(
                "'{}' cannot open an assignment; use delivery or loan",
                input.kind
            )));
        }

        let now = Utc::now();
        let opened_at = input.opened_at.unwrap_or(now);
        if opened_at > now {
            return Err(ServiceError::ValidationError(
                "opened_at cannot be in the future".into(),
            ));
        }
        match (input.kind, input.expected_end) {
            (EventKind::Loan, None) => {
                return Err(ServiceError::ValidationError(
                    "loans require an expected_end".into(),
                ))
            }
            (_, Some(end)) if end <= opened_at => {
                return Err(ServiceError::ValidationError(
                    "expected_end must be after opened_at".into(),
                ))
            }
            _ => {}
        }

        let started = Instant::now();
        let txn = self.db_pool.begin().await?;

        let product = find_product(&txn, input.product_id).await?;
        if !product.active {
            return Err(ServiceError::InvalidOperation("product is inactive".into()));
        }
        if let Some(open) = open_event(&txn, product.id).await? {
            return Err(ServiceError::Conflict(format!(
                "product {} already has an open {} event ({})",
                product.serial_number, open.kind, open.id
            )));
        }
        if product.status != ProductStatus::Available {
            return Err(ServiceError::Conflict(format!(
                "product {} is {}, not available",
                product.serial_number, product.status
            )));
        }

        let employee = employee::Entity::find_by_id(input.employee_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("employee", input.employee_id))?;
        if !employee.active {
            return Err(ServiceError::InvalidOperation(format!(
                "employee '{}' is inactive",
                employee.full_name
            )));
        }

        let department_id = input.department_id.unwrap_or(employee.department_id);
        let department = department::Entity::find_by_id(department_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("department", department_id))?;
        if !department.active {
            return Err(ServiceError::InvalidOperation(format!(
                "department '{}' is inactive",
                department.name
            )));
        }
        if employee.department_id != department.id {
            return Err(ServiceError::ValidationError(format!(
                "employee '{}' does not belong to department '{}'",
                employee.full_name, department.name
            )));
        }

        let condition = input.condition.unwrap_or(product.condition);
        let event = assignment_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            employee_id: Set(Some(employee.id)),
            department_id: Set(Some(department.id)),
            kind: Set(input.kind),
            opened_at: Set(opened_at),
            expected_end: Set(input.expected_end),
            closed_at: Set(None),
            condition_at_open: Set(condition),
            notes_open: Set(optional_text(input.notes)),
            opened_by: Set(actor.to_string()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        set_product_state(&txn, product, ProductStatus::Assigned, condition).await?;
        db::commit(txn, "open_assignment", started).await?;

        counter!("assettrack.assignments.opened", 1, "kind" => event.kind.to_string());
        self.event_sender
            .send_or_log(Event::AssignmentOpened {
                event_id: event.id,
                product_id: event.product_id,
                employee_id: event.employee_id,
            })
            .await;
        info!(event_id = %event.id, employee_id = %employee.id, "Assignment opened");
        Ok(event)
    }

    /// Records the return of a delivered or loaned product
    #[instrument(skip(self, input))]
    pub async fn close_assignment(
        &self,
        event_id: Uuid,
        input: CloseAssignment,
        actor: &str,
    ) -> Result<assignment_event::Model, ServiceError> {
        input.validate()?;
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;

        let event = find_event(&txn, event_id).await?;
        if !event.kind.is_assignment() {
            return Err(ServiceError::InvalidOperation(format!(
                "{} events are closed by completing the repair",
                event.kind
            )));
        }
        if !event.is_open() {
            return Err(ServiceError::Conflict(format!(
                "event {event_id} has no open assignment to close"
            )));
        }

        let now = Utc::now();
        let closed_at = input.closed_at.unwrap_or(now);
        if closed_at < event.opened_at {
            return Err(ServiceError::ValidationError(
                "closed_at cannot precede opened_at".into(),
            ));
        }
        if closed_at > now {
            return Err(ServiceError::ValidationError(
                "closed_at cannot be in the future".into(),
            ));
        }

        let product = find_product(&txn, event.product_id).await?;
        let (closed, _closing) = close_event(
            &txn,
            event,
            Closure {
                kind: EventKind::Return,
                at: closed_at,
                condition: input.condition,
                reason: Some(input.reason),
                notes: optional_text(input.notes),
            },
            actor,
        )
        .await?;
        set_product_state(&txn, product, ProductStatus::Available, input.condition).await?;
        db::commit(txn, "close_assignment", started).await?;

        counter!("assettrack.assignments.closed", 1, "kind" => closed.kind.to_string());
        self.event_sender
            .send_or_log(Event::AssignmentClosed {
                event_id: closed.id,
                product_id: closed.product_id,
            })
            .await;
        info!(event_id = %closed.id, reason = %input.reason, "Assignment closed");
        Ok(closed)
    }

    /// Sends a product to repair. An open assignment is closed first with reason `fault`.
    #[instrument(skip(self, input))]
    pub async fn send_to_repair(
        &self,
        product_id: Uuid,
        input: RepairRequest,
        actor: &str,
    ) -> Result<assignment_event::Model, ServiceError> {
        input.validate()?;
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;

        let product = find_product(&txn, product_id).await?;
        if !product.active {
            return Err(ServiceError::InvalidOperation("product is inactive".into()));
        }
        let now = Utc::now();
        let notes = optional_text(input.notes);

        match product.status {
            ProductStatus::Available => {}
            ProductStatus::Assigned => {
                let open = open_event(&txn, product_id).await?.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "product {product_id} is assigned without an open event"
                    ))
                })?;
                let (closed, _) = close_event(
                    &txn,
                    open,
                    Closure {
                        kind: EventKind::Return,
                        at: now,
                        condition: product.condition,
                        reason: Some(ReturnReason::Fault),
                        notes: notes.clone(),
                    },
                    actor,
                )
                .await?;
                counter!("assettrack.assignments.closed", 1, "kind" => closed.kind.to_string());
            }
            status => {
                return Err(ServiceError::Conflict(format!(
                    "product {} is {status} and cannot go to repair",
                    product.serial_number
                )))
            }
        }

        let event = assignment_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            employee_id: Set(None),
            department_id: Set(None),
            kind: Set(EventKind::Repair),
            opened_at: Set(now),
            expected_end: Set(None),
            closed_at: Set(None),
            condition_at_open: Set(product.condition),
            notes_open: Set(notes.clone()),
            opened_by: Set(actor.to_string()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let location_id = product.location_id;
        let condition = product.condition;
        set_product_state(&txn, product, ProductStatus::UnderRepair, condition).await?;
        record_movement(
            &txn,
            Movement::new(product_id, MovementKind::Repair, actor)
                .from(Some(location_id))
                .describe(match &notes {
                    Some(notes) => format!("Sent to repair: {notes}"),
                    None => "Sent to repair".to_string(),
                }),
        )
        .await?;
        db::commit(txn, "send_to_repair", started).await?;

        counter!("assettrack.assignments.opened", 1, "kind" => "repair");
        self.event_sender
            .send_or_log(Event::RepairStarted {
                event_id: event.id,
                product_id,
            })
            .await;
        info!(event_id = %event.id, %product_id, "Product sent to repair");
        Ok(event)
    }

    /// Closes the open repair and makes the product available again
    #[instrument(skip(self, input))]
    pub async fn complete_repair(
        &self,
        product_id: Uuid,
        input: CompleteRepair,
        actor: &str,
    ) -> Result<assignment_event::Model, ServiceError> {
        input.validate()?;
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;

        let product = find_product(&txn, product_id).await?;
        let open = match open_event(&txn, product_id).await? {
            Some(event) if event.kind == EventKind::Repair => event,
            _ => {
                return Err(ServiceError::Conflict(format!(
                    "product {} has no open repair",
                    product.serial_number
                )))
            }
        };

        let notes = optional_text(input.notes);
        let (closed, _) = close_event(
            &txn,
            open,
            Closure {
                kind: EventKind::RepairCompleted,
                at: Utc::now(),
                condition: input.condition,
                reason: None,
                notes: notes.clone(),
            },
            actor,
        )
        .await?;

        let location_id = product.location_id;
        set_product_state(&txn, product, ProductStatus::Available, input.condition).await?;
        record_movement(
            &txn,
            Movement::new(product_id, MovementKind::RepairReturn, actor)
                .to(Some(location_id))
                .describe(match &notes {
                    Some(notes) => format!("Back from repair: {notes}"),
                    None => "Back from repair".to_string(),
                }),
        )
        .await?;
        db::commit(txn, "complete_repair", started).await?;

        counter!("assettrack.assignments.closed", 1, "kind" => "repair");
        self.event_sender
            .send_or_log(Event::RepairCompleted {
                event_id: closed.id,
                product_id,
            })
            .await;
        Ok(closed)
    }

    /// Employee confirmation of a delivery or loan
    #[instrument(skip(self))]
    pub async fn acknowledge(&self, event_id: Uuid) -> Result<assignment_event::Model, ServiceError> {
        let db = &*self.db_pool;
        let event = find_event(db, event_id).await?;

        if !event.kind.is_assignment() {
            return Err(ServiceError::InvalidOperation(format!(
                "{} events cannot be acknowledged",
                event.kind
            )));
        }
        if event.acknowledged {
            return Err(ServiceError::Conflict("event is already acknowledged".into()));
        }
        if !event.is_open() {
            return Err(ServiceError::Conflict("event is already closed".into()));
        }

        let mut model: assignment_event::ActiveModel = event.into();
        model.acknowledged = Set(true);
        model.acknowledged_at = Set(Some(Utc::now()));
        let event = model.update(db).await?;

        self.event_sender
            .send_or_log(Event::AssignmentAcknowledged(event_id))
            .await;
        Ok(event)
    }

    /// Voids a wrongly entered open event. No closing row is appended.
    #[instrument(skip(self, input))]
    pub async fn void_event(
        &self,
        event_id: Uuid,
        input: VoidRequest,
        actor: &str,
    ) -> Result<assignment_event::Model, ServiceError> {
        input.validate()?;
        let started = Instant::now();
        let txn = self.db_pool.begin().await?;

        let event = find_event(&txn, event_id).await?;
        if !event.is_open() {
            return Err(ServiceError::Conflict(
                "only open events can be voided".into(),
            ));
        }

        let product = find_product(&txn, event.product_id).await?;
        let condition_at_open = event.condition_at_open;

        let mut model: assignment_event::ActiveModel = event.into();
        model.voided = Set(true);
        model.closed_at = Set(Some(Utc::now()));
        model.closed_by = Set(Some(actor.to_string()));
        model.notes_close = Set(Some(format!("Voided: {}", input.reason.trim())));
        let voided = model.update(&txn).await?;

        let condition = product.condition;
        if product.status != ProductStatus::Retired {
            set_product_state(&txn, product, ProductStatus::Available, condition).await?;
        }
        db::commit(txn, "void_event", started).await?;

        warn!(%event_id, ?condition_at_open, "Ledger event voided");
        self.event_sender
            .send_or_log(Event::AssignmentVoided(event_id))
            .await;
        Ok(voided)
    }

    pub async fn get_event(&self, event_id: Uuid) -> Result<assignment_event::Model, ServiceError> {
        find_event(&*self.db_pool, event_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_events(
        &self,
        query: &EventQuery,
        page: PageRequest,
    ) -> Result<Page<assignment_event::Model>, ServiceError> {
        let paginator = filter_events(query)
            .order_by_desc(assignment_event::Column::OpenedAt)
            .order_by_desc(assignment_event::Column::CreatedAt)
            .paginate(&*self.db_pool, page.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.index()).await?;
        Ok(Page::new(items, total, page))
    }

    /// Full ledger of a product, oldest first, voided rows included
    pub async fn product_history(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<assignment_event::Model>, ServiceError> {
        let db = &*self.db_pool;
        find_product(db, product_id).await?;

        Ok(assignment_event::Entity::find()
            .filter(assignment_event::Column::ProductId.eq(product_id))
            .order_by_asc(assignment_event::Column::OpenedAt)
            .order_by_asc(assignment_event::Column::CreatedAt)
            .all(db)
            .await?)
    }

    /// Open loans whose expected end has passed
    pub async fn list_overdue_loans(&self) -> Result<Vec<assignment_event::Model>, ServiceError> {
        overdue_loans(&*self.db_pool, Utc::now()).await
    }
}

pub(crate) async fn overdue_loans<C: ConnectionTrait>(
    conn: &C,
    now: DateTime<Utc>,
) -> Result<Vec<assignment_event::Model>, ServiceError> {
    Ok(assignment_event::Entity::find()
        .filter(assignment_event::Column::Kind.eq(EventKind::Loan))
        .filter(assignment_event::Column::ClosedAt.is_null())
        .filter(assignment_event::Column::ExpectedEnd.lt(now))
        .order_by_asc(assignment_event::Column::ExpectedEnd)
        .all(conn)
        .await?)
}

pub(crate) async fn find_event<C: ConnectionTrait>(
    conn: &C,
    event_id: Uuid,
) -> Result<assignment_event::Model, ServiceError> {
    assignment_event::Entity::find_by_id(event_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("assignment event", event_id))
}

/// Stamps the opening row as closed, then appends the closing row that points at it
async fn close_event(
    txn: &DatabaseTransaction,
    open: assignment_event::Model,
    closure: Closure,
    actor: &str,
) -> Result<(assignment_event::Model, assignment_event::Model), ServiceError> {
    let product_id = open.product_id;
    let employee_id = open.employee_id;
    let department_id = open.department_id;
    let open_id = open.id;

    let mut model: assignment_event::ActiveModel = open.into();
    model.closed_at = Set(Some(closure.at));
    model.condition_at_close = Set(Some(closure.condition));
    model.return_reason = Set(closure.reason);
    model.notes_close = Set(closure.notes.clone());
    model.closed_by = Set(Some(actor.to_string()));
    let closed = model.update(txn).await?;

    let closing = assignment_event::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        employee_id: Set(employee_id),
        department_id: Set(department_id),
        kind: Set(closure.kind),
        opened_at: Set(closure.at),
        expected_end: Set(None),
        closed_at: Set(Some(closure.at)),
        condition_at_open: Set(closure.condition),
        condition_at_close: Set(Some(closure.condition)),
        return_reason: Set(closure.reason),
        notes_open: Set(closure.notes),
        opened_by: Set(actor.to_string()),
        closed_by: Set(Some(actor.to_string())),
        closes_event_id: Set(Some(open_id)),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    Ok((closed, closing))
}

async fn set_product_state(
    txn: &DatabaseTransaction,
    product: product::Model,
    status: ProductStatus,
    condition: ProductCondition,
) -> Result<product::Model, ServiceError> {
    let mut model: product::ActiveModel = product.into();
    model.status = Set(status);
    model.condition = Set(condition);
    Ok(model.update(txn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_delivery_and_loan_open_assignments() {
        assert!(EventKind::Delivery.is_assignment());
        assert!(EventKind::Loan.is_assignment());
        assert!(!EventKind::Repair.is_assignment());
        assert!(!EventKind::Return.is_opening());
    }

    #[test]
    fn open_assignment_deserializes_with_defaults() {
        let input: OpenAssignment = serde_json::from_value(serde_json::json!({
            "product_id": Uuid::nil(),
            "employee_id": Uuid::nil(),
            "kind": "loan",
            "expected_end": "2030-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(input.kind, EventKind::Loan);
        assert!(input.department_id.is_none());
        assert!(input.opened_at.is_none());
    }

    #[test]
    fn close_rejects_unknown_reasons() {
        let result: Result<CloseAssignment, _> = serde_json::from_value(serde_json::json!({
            "condition": "used_good",
            "reason": "lost_it"
        }));
        assert!(result.is_err());
    }
}

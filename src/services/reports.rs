use chrono::{DateTime, Duration, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        assignment_event, brand, category, department, employee, location, product, supplier,
        EventKind, ProductStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    reports::{
        self,
        pdf::{self as pdf_writer, Section},
        round_money, Cell, RenderedReport, ReportFormat, ReportTable,
    },
    services::{
        assignments::{filter_events, find_event, overdue_loans, EventQuery},
        products::{filter_products, ProductQuery},
    },
};

const PRODUCT_COLUMNS: [&str; 12] = [
    "Serial",
    "Internal code",
    "Category",
    "Brand",
    "Model",
    "Status",
    "Condition",
    "Price",
    "Purchase date",
    "Supplier",
    "Location",
    "Warranty end",
];

const ASSIGNMENT_COLUMNS: [&str; 10] = [
    "Date",
    "Kind",
    "Serial",
    "Product",
    "Employee",
    "Department",
    "Condition",
    "Expected end",
    "Closed at",
    "Reason",
];

/// Scope of a report
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportFilter {
    /// `pdf`, `xlsx`, `csv` or `json`
    #[serde(default)]
    pub format: ReportFormat,
    /// Purchase date (products) or opening date (assignments), inclusive
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub product_id: Option<Uuid>,
    pub employee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
}

impl ReportFilter {
    fn describe(&self, names: &Names) -> String {
        let mut parts = Vec::new();
        if let Some(from) = self.from {
            parts.push(format!("from {from}"));
        }
        if let Some(to) = self.to {
            parts.push(format!("to {to}"));
        }
        if let Some(id) = self.category_id {
            parts.push(format!("category {}", names.category(id)));
        }
        if let Some(id) = self.department_id {
            parts.push(format!("department {}", names.department(id)));
        }
        if let Some(id) = self.employee_id {
            parts.push(format!("employee {}", names.employee(id)));
        }
        if let Some(id) = self.product_id {
            parts.push(format!("product {id}"));
        }
        if let Some(status) = self.status {
            parts.push(format!("status {}", status.label()));
        }

        let scope = if parts.is_empty() {
            "All records".to_string()
        } else {
            parts.join(", ")
        };
        format!("{scope}. Generated {}", Utc::now().format("%Y-%m-%d %H:%M UTC"))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategorySummary {
    pub category_id: Uuid,
    pub name: String,
    pub products: u64,
    #[schema(value_type = String)]
    pub total_value: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepartmentSummary {
    pub department_id: Uuid,
    pub name: String,
    pub open_assignments: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WarrantyAlert {
    pub product_id: Uuid,
    pub serial_number: String,
    pub model: String,
    pub warranty_end: NaiveDate,
    pub days_left: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverdueLoan {
    pub event_id: Uuid,
    pub product_id: Uuid,
    pub serial_number: String,
    pub employee_name: Option<String>,
    pub expected_end: Option<DateTime<Utc>>,
    pub days_overdue: i64,
}

/// Dashboard figures over the active catalog and the recent ledger
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InventorySummary {
    pub generated_at: DateTime<Utc>,
    pub total_products: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_condition: BTreeMap<String, u64>,
    pub by_category: Vec<CategorySummary>,
    pub open_assignments_by_department: Vec<DepartmentSummary>,
    #[schema(value_type = String)]
    pub total_value: Decimal,
    #[schema(value_type = Option<String>)]
    pub average_value: Option<Decimal>,
    pub expiring_warranties: Vec<WarrantyAlert>,
    /// Ledger rows opened within the activity window
    pub recent_events: u64,
    pub overdue_loans: Vec<OverdueLoan>,
}

/// Display names of the master data, loaded once per report
#[derive(Default)]
struct Names {
    categories: HashMap<Uuid, String>,
    brands: HashMap<Uuid, String>,
    suppliers: HashMap<Uuid, String>,
    locations: HashMap<Uuid, String>,
    departments: HashMap<Uuid, String>,
    employees: HashMap<Uuid, String>,
}

impl Names {
    async fn load(db: &DbPool) -> Result<Self, ServiceError> {
        Ok(Self {
            categories: category::Entity::find()
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m.name))
                .collect(),
            brands: brand::Entity::find()
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m.name))
                .collect(),
            suppliers: supplier::Entity::find()
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m.name))
                .collect(),
            locations: location::Entity::find()
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m.name))
                .collect(),
            departments: department::Entity::find()
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m.name))
                .collect(),
            employees: employee::Entity::find()
                .all(db)
                .await?
                .into_iter()
                .map(|m| (m.id, m.full_name))
                .collect(),
        })
    }

    fn lookup(map: &HashMap<Uuid, String>, id: Uuid) -> String {
        map.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn category(&self, id: Uuid) -> String {
        Self::lookup(&self.categories, id)
    }

    fn brand(&self, id: Uuid) -> String {
        Self::lookup(&self.brands, id)
    }

    fn department(&self, id: Uuid) -> String {
        Self::lookup(&self.departments, id)
    }

    fn employee(&self, id: Uuid) -> String {
        Self::lookup(&self.employees, id)
    }
}

/// Upper bound of the summary look-ahead and look-back windows
const MAX_WINDOW_DAYS: i64 = 3650;

/// Read-only projections of the catalog and the ledger
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    warranty_alert_days: i64,
    recent_activity_days: i64,
}

impl ReportService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        warranty_alert_days: i64,
        recent_activity_days: i64,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            warranty_alert_days: warranty_alert_days.clamp(0, MAX_WINDOW_DAYS),
            recent_activity_days: recent_activity_days.clamp(0, MAX_WINDOW_DAYS),
        }
    }

    #[instrument(skip(self))]
    pub async fn inventory_summary(&self) -> Result<InventorySummary, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let today = now.date_naive();
        let names = Names::load(db).await?;

        let products = product::Entity::find()
            .filter(product::Column::Active.eq(true))
            .all(db)
            .await?;
        let serials: HashMap<Uuid, String> = products
            .iter()
            .map(|p| (p.id, p.serial_number.clone()))
            .collect();

        let mut by_status = BTreeMap::new();
        let mut by_condition = BTreeMap::new();
        let mut categories: HashMap<Uuid, (u64, Decimal)> = HashMap::new();
        let mut total_value = Decimal::ZERO;
        let mut priced = 0u64;
        let mut expiring_warranties = Vec::new();
        let alert_until = today + Duration::days(self.warranty_alert_days);

        for p in &products {
            *by_status.entry(p.status.to_string()).or_insert(0) += 1;
            *by_condition.entry(p.condition.to_string()).or_insert(0) += 1;

            let entry = categories.entry(p.category_id).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            if let Some(price) = p.purchase_price {
                entry.1 += price;
                total_value += price;
                priced += 1;
            }

            if let Some(end) = p.warranty_end {
                if end >= today && end <= alert_until {
                    expiring_warranties.push(WarrantyAlert {
                        product_id: p.id,
                        serial_number: p.serial_number.clone(),
                        model: p.model.clone(),
                        warranty_end: end,
                        days_left: (end - today).num_days(),
                    });
                }
            }
        }
        expiring_warranties.sort_by_key(|w| w.warranty_end);

        let mut by_category: Vec<CategorySummary> = categories
            .into_iter()
            .map(|(id, (count, value))| CategorySummary {
                category_id: id,
                name: names.category(id),
                products: count,
                total_value: value,
            })
            .collect();
        by_category.sort_by(|a, b| b.products.cmp(&a.products).then(a.name.cmp(&b.name)));

        let open_events = assignment_event::Entity::find()
            .filter(assignment_event::Column::ClosedAt.is_null())
            .filter(assignment_event::Column::Kind.is_in([EventKind::Delivery, EventKind::Loan]))
            .all(db)
            .await?;
        let mut per_department: HashMap<Uuid, u64> = HashMap::new();
        for event in &open_events {
            if let Some(department_id) = event.department_id {
                *per_department.entry(department_id).or_insert(0) += 1;
            }
        }
        let mut open_assignments_by_department: Vec<DepartmentSummary> = per_department
            .into_iter()
            .map(|(id, count)| DepartmentSummary {
                department_id: id,
                name: names.department(id),
                open_assignments: count,
            })
            .collect();
        open_assignments_by_department
            .sort_by(|a, b| b.open_assignments.cmp(&a.open_assignments).then(a.name.cmp(&b.name)));

        let recent_events = assignment_event::Entity::find()
            .filter(
                assignment_event::Column::OpenedAt
                    .gte(now - Duration::days(self.recent_activity_days)),
            )
            .count(db)
            .await?;

        let overdue_loans = overdue_loans(db, now)
            .await?
            .into_iter()
            .map(|event| OverdueLoan {
                event_id: event.id,
                product_id: event.product_id,
                serial_number: serials
                    .get(&event.product_id)
                    .cloned()
                    .unwrap_or_default(),
                employee_name: event.employee_id.map(|id| names.employee(id)),
                expected_end: event.expected_end,
                days_overdue: event
                    .expected_end
                    .map(|end| (now - end).num_days())
                    .unwrap_or(0),
            })
            .collect();

        Ok(InventorySummary {
            generated_at: now,
            total_products: products.len() as u64,
            by_status,
            by_condition,
            by_category,
            open_assignments_by_department,
            total_value,
            average_value: (priced > 0)
                .then(|| round_money(total_value / Decimal::from(priced))),
            expiring_warranties,
            recent_events,
            overdue_loans,
        })
    }

    /// Catalog listing in the requested format
    #[instrument(skip(self))]
    pub async fn products_report(&self, filter: &ReportFilter) -> Result<RenderedReport, ServiceError> {
        let db = &*self.db_pool;
        let names = Names::load(db).await?;

        let query = ProductQuery {
            category_id: filter.category_id,
            status: filter.status,
            ..Default::default()
        };
        let mut select = filter_products(&query);
        if let Some(id) = filter.product_id {
            select = select.filter(product::Column::Id.eq(id));
        }
        if let Some(from) = filter.from {
            select = select.filter(product::Column::PurchaseDate.gte(from));
        }
        if let Some(to) = filter.to {
            select = select.filter(product::Column::PurchaseDate.lte(to));
        }
        let mut products = select
            .order_by_asc(product::Column::SerialNumber)
            .all(db)
            .await?;

        // employee and department scope the products currently held
        if filter.employee_id.is_some() || filter.department_id.is_some() {
            let mut open = assignment_event::Entity::find()
                .filter(assignment_event::Column::ClosedAt.is_null())
                .filter(assignment_event::Column::Kind.is_in([EventKind::Delivery, EventKind::Loan]));
            if let Some(id) = filter.employee_id {
                open = open.filter(assignment_event::Column::EmployeeId.eq(id));
            }
            if let Some(id) = filter.department_id {
                open = open.filter(assignment_event::Column::DepartmentId.eq(id));
            }
            let held: Vec<Uuid> = open.all(db).await?.into_iter().map(|e| e.product_id).collect();
            products.retain(|p| held.contains(&p.id));
        }

        let mut table = ReportTable::new("Products", &PRODUCT_COLUMNS)
            .with_subtitle(filter.describe(&names));
        for p in &products {
            table.push(vec![
                Cell::text(&p.serial_number),
                Cell::text(&p.internal_code),
                Cell::text(names.category(p.category_id)),
                Cell::text(names.brand(p.brand_id)),
                Cell::text(&p.model),
                Cell::text(p.status.label()),
                Cell::text(p.condition.label()),
                Cell::opt_money(p.purchase_price),
                Cell::opt_date(p.purchase_date),
                Cell::opt_text(p.supplier_id.map(|id| Names::lookup(&names.suppliers, id))),
                Cell::text(Names::lookup(&names.locations, p.location_id)),
                Cell::opt_date(p.warranty_end),
            ]);
        }

        self.finish("products", &table, filter.format).await
    }

    /// Ledger history in the requested format
    #[instrument(skip(self))]
    pub async fn assignments_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<RenderedReport, ServiceError> {
        let db = &*self.db_pool;
        let names = Names::load(db).await?;

        let query = EventQuery {
            product_id: filter.product_id,
            employee_id: filter.employee_id,
            department_id: filter.department_id,
            from: filter.from,
            to: filter.to,
            ..Default::default()
        };
        let events = filter_events(&query)
            .order_by_asc(assignment_event::Column::OpenedAt)
            .order_by_asc(assignment_event::Column::CreatedAt)
            .all(db)
            .await?;

        let product_ids: Vec<Uuid> = events.iter().map(|e| e.product_id).collect();
        let products: HashMap<Uuid, product::Model> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            product::Entity::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let mut table = ReportTable::new("Assignments", &ASSIGNMENT_COLUMNS)
            .with_subtitle(filter.describe(&names));
        for event in &events {
            let Some(p) = products.get(&event.product_id) else {
                continue;
            };
            if filter.category_id.is_some_and(|id| id != p.category_id)
                || filter.status.is_some_and(|status| status != p.status)
            {
                continue;
            }

            let kind = if event.voided {
                format!("{} (void)", event.kind.label())
            } else {
                event.kind.label().to_string()
            };
            table.push(vec![
                Cell::DateTime(event.opened_at),
                Cell::text(kind),
                Cell::text(&p.serial_number),
                Cell::text(format!("{} {}", names.brand(p.brand_id), p.model)),
                Cell::opt_text(event.employee_id.map(|id| names.employee(id))),
                Cell::opt_text(event.department_id.map(|id| names.department(id))),
                Cell::text(event.condition_at_open.label()),
                Cell::opt_datetime(event.expected_end),
                Cell::opt_datetime(event.closed_at),
                Cell::opt_text(event.return_reason.map(|r| r.label())),
            ]);
        }

        self.finish("assignments", &table, filter.format).await
    }

    /// Printable receipt of one ledger event
    #[instrument(skip(self))]
    pub async fn assignment_receipt(&self, event_id: Uuid) -> Result<RenderedReport, ServiceError> {
        let db = &*self.db_pool;
        let event = find_event(db, event_id).await?;
        let product = product::Entity::find_by_id(event.product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("product", event.product_id))?;
        let brand = brand::Entity::find_by_id(product.brand_id).one(db).await?;
        let category = category::Entity::find_by_id(product.category_id).one(db).await?;
        let employee = match event.employee_id {
            Some(id) => employee::Entity::find_by_id(id).one(db).await?,
            None => None,
        };
        let department = match event.department_id {
            Some(id) => department::Entity::find_by_id(id).one(db).await?,
            None => None,
        };

        let when = |dt: Option<DateTime<Utc>>| {
            dt.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".into())
        };

        let mut event_section = Section::new("Event")
            .line("Kind", event.kind.label())
            .line("Date", when(Some(event.opened_at)))
            .line("Condition", event.condition_at_open.label())
            .line("Registered by", event.opened_by.clone());
        if event.expected_end.is_some() {
            event_section = event_section.line("Expected end", when(event.expected_end));
        }
        if event.closed_at.is_some() && event.closes_event_id.is_none() {
            event_section = event_section.line("Closed at", when(event.closed_at));
        }
        if let Some(reason) = event.return_reason {
            event_section = event_section.line("Reason", reason.label());
        }
        if let Some(notes) = event.notes_open.clone().or(event.notes_close.clone()) {
            event_section = event_section.line("Notes", notes);
        }
        if event.voided {
            event_section = event_section.line("Status", "VOID");
        }

        let product_section = Section::new("Product")
            .line("Serial number", product.serial_number.clone())
            .line("Internal code", product.internal_code.clone())
            .line("Brand", brand.map(|b| b.name).unwrap_or_default())
            .line("Model", product.model.clone())
            .line("Category", category.map(|c| c.name).unwrap_or_default());

        let mut sections = vec![event_section, product_section];
        if let Some(employee) = &employee {
            sections.push(
                Section::new("Employee")
                    .line("Name", employee.full_name.clone())
                    .line("National id", employee.national_id.clone())
                    .line("Email", employee.email.clone())
                    .line("Job title", employee.job_title.clone().unwrap_or_default()),
            );
        }
        if let Some(department) = &department {
            sections.push(
                Section::new("Department")
                    .line("Name", department.name.clone())
                    .line("Code", department.code.clone()),
            );
        }

        let title = format!("{} receipt", event.kind.label());
        let subtitle = format!("Event {}", event.id);
        let bytes = pdf_writer::render_sections(
            &title,
            Some(&subtitle),
            &sections,
            &["Issued by", "Received by"],
        )?;

        counter!("assettrack.reports.generated", 1, "report" => "receipt", "format" => "pdf");
        Ok(RenderedReport {
            bytes,
            content_type: ReportFormat::Pdf.content_type(),
            file_name: format!("receipt-{}.pdf", product.serial_number),
            rows: 1,
        })
    }

    async fn finish(
        &self,
        name: &'static str,
        table: &ReportTable,
        format: ReportFormat,
    ) -> Result<RenderedReport, ServiceError> {
        let stamp = Utc::now().format("%Y%m%d-%H%M");
        let rendered = reports::render(table, format, &format!("{name}-{stamp}"))?;

        counter!("assettrack.reports.generated", 1, "report" => name, "format" => format.to_string());
        self.event_sender
            .send_or_log(Event::ReportGenerated {
                report: name.to_string(),
                format: format.to_string(),
                rows: rendered.rows,
            })
            .await;
        info!(report = name, %format, rows = rendered.rows, "Report generated");
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_description_defaults_to_all_records() {
        let names = Names::default();
        let text = ReportFilter::default().describe(&names);
        assert!(text.starts_with("All records. Generated "));

        let filter = ReportFilter {
            status: Some(ProductStatus::Assigned),
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        assert!(filter
            .describe(&names)
            .starts_with("from 2024-01-01, status Assigned."));
    }

    #[test]
    fn column_sets_match_the_documents() {
        assert_eq!(PRODUCT_COLUMNS.len(), 12);
        assert_eq!(ASSIGNMENT_COLUMNS[0], "Date");
        assert_eq!(ASSIGNMENT_COLUMNS[9], "Reason");
    }
}

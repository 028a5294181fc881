//! Screen profiles: endpoint, filters, columns, and bulk actions per list screen.

use std::sync::Arc;

use ledgerdesk_grid::client::ResourceClient;
use ledgerdesk_grid::entity::{Entity, EntityId, Record};
use ledgerdesk_grid::filter::{FilterSchema, Predicate};
use ledgerdesk_grid::paging::PageRequest;
use ledgerdesk_grid::present::{ColumnSpec, Formatter, TimestampStyle};
use ledgerdesk_grid::screen::Screen;
use ledgerdesk_grid::selection::ids_payload;
use serde_json::{Value, json};

use crate::client::{CliError, CliResult};

const OVERTIME_SECS: u64 = 8 * 3600;

/// A bulk mutation a screen offers.
#[derive(Clone, Debug)]
pub(crate) struct BulkActionProfile {
    pub(crate) name: &'static str,
    pub(crate) summary: &'static str,
    pub(crate) endpoint: &'static str,
    /// Fields merged into the `{ids: [...]}` payload.
    pub(crate) extra: Value,
}

impl BulkActionProfile {
    pub(crate) fn payload(&self, ids: &[EntityId]) -> Value {
        let mut payload = ids_payload(ids);
        if let (Some(target), Some(extra)) = (payload.as_object_mut(), self.extra.as_object()) {
            target.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
        }
        payload
    }
}

/// Everything needed to open one list screen.
#[derive(Clone, Debug)]
pub(crate) struct ScreenProfile {
    pub(crate) name: &'static str,
    pub(crate) title: &'static str,
    pub(crate) endpoint: &'static str,
    pub(crate) schema: FilterSchema<Record>,
    pub(crate) columns: Vec<ColumnSpec>,
    pub(crate) actions: Vec<BulkActionProfile>,
}

impl ScreenProfile {
    pub(crate) fn action(&self, name: &str) -> CliResult<&BulkActionProfile> {
        self.actions
            .iter()
            .find(|action| action.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                let known: Vec<&str> = self.actions.iter().map(|action| action.name).collect();
                if known.is_empty() {
                    CliError::validation(format!("screen '{}' has no bulk actions", self.name))
                } else {
                    CliError::validation(format!(
                        "unknown action '{name}' for screen '{}' (expected one of: {})",
                        self.name,
                        known.join(", ")
                    ))
                }
            })
    }

    pub(crate) fn open(&self, client: ResourceClient, request: PageRequest) -> Screen<Record> {
        Screen::new(client, self.endpoint, self.schema.clone(), self.columns.clone())
            .with_request(request)
    }
}

/// Look up a profile by name.
pub(crate) fn find(name: &str) -> CliResult<ScreenProfile> {
    let all = profiles();
    let names: Vec<&str> = all.iter().map(|profile| profile.name).collect();
    let message = format!(
        "unknown screen '{name}' (expected one of: {})",
        names.join(", ")
    );
    all.into_iter()
        .find(|profile| profile.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| CliError::validation(message))
}

/// Every screen the console knows.
pub(crate) fn profiles() -> Vec<ScreenProfile> {
    vec![employees(), attendance(), prospects(), activity()]
}

fn day_column(key: &str, header: &str, path: &str) -> ColumnSpec {
    ColumnSpec::new(key, header, path).format(Formatter::Timestamp(TimestampStyle::Absolute(
        "%Y-%m-%d".into(),
    )))
}

fn employees() -> ScreenProfile {
    ScreenProfile {
        name: "employees",
        title: "Employees",
        endpoint: "/employees",
        schema: FilterSchema::new()
            .search(["name", "email", "department.name"])
            .category("status")
            .category("department.name")
            .date_field("joined_at"),
        columns: vec![
            ColumnSpec::new("id", "ID", "id"),
            ColumnSpec::new("name", "NAME", "name"),
            ColumnSpec::new("email", "EMAIL", "email"),
            ColumnSpec::new("department", "DEPARTMENT", "department.name").or("department_name"),
            ColumnSpec::new("status", "STATUS", "status"),
            day_column("joined", "JOINED", "joined_at").or("created_at"),
        ],
        actions: vec![
            BulkActionProfile {
                name: "deactivate",
                summary: "mark employees inactive",
                endpoint: "/employees/bulk-status",
                extra: json!({"status": "inactive"}),
            },
            BulkActionProfile {
                name: "activate",
                summary: "mark employees active",
                endpoint: "/employees/bulk-status",
                extra: json!({"status": "active"}),
            },
        ],
    }
}

fn attendance() -> ScreenProfile {
    let overtime = Predicate::Custom(Arc::new(|row: &Record| {
        row.field("worked_seconds")
            .and_then(Value::as_u64)
            .is_some_and(|secs| secs > OVERTIME_SECS)
    }));
    ScreenProfile {
        name: "attendance",
        title: "Attendance report",
        endpoint: "/attendance/report",
        schema: FilterSchema::new()
            .search(["employee.name", "employee_name", "department.name"])
            .category("status")
            .flag(
                "late",
                "Only late arrivals",
                Predicate::Truthy {
                    path: "is_late".into(),
                },
            )
            .flag("overtime", "Worked more than 8h", overtime)
            .date_field("date"),
        columns: vec![
            ColumnSpec::new("employee", "EMPLOYEE", "employee.name").or("employee_name"),
            day_column("date", "DATE", "date"),
            ColumnSpec::new("check_in", "IN", "check_in").format(Formatter::Timestamp(
                TimestampStyle::Absolute("%H:%M".into()),
            )),
            ColumnSpec::new("check_out", "OUT", "check_out").format(Formatter::Timestamp(
                TimestampStyle::Absolute("%H:%M".into()),
            )),
            ColumnSpec::new("worked", "WORKED", "worked_seconds").format(Formatter::Duration),
            ColumnSpec::new("late", "LATE", "is_late").format(Formatter::Boolean {
                yes: "late".into(),
                no: "on time".into(),
            }),
        ],
        actions: Vec::new(),
    }
}

fn prospects() -> ScreenProfile {
    ScreenProfile {
        name: "prospects",
        title: "Prospects",
        endpoint: "/prospects",
        schema: FilterSchema::new()
            .search(["name", "company", "email"])
            .category("source")
            .flag(
                "converted",
                "Only converted prospects",
                Predicate::Truthy {
                    path: "converted".into(),
                },
            )
            .date_field("created_at"),
        columns: vec![
            ColumnSpec::new("id", "ID", "id"),
            ColumnSpec::new("name", "NAME", "name"),
            ColumnSpec::new("company", "COMPANY", "company").placeholder("N/A"),
            ColumnSpec::new("email", "EMAIL", "email"),
            ColumnSpec::new("source", "SOURCE", "source"),
            ColumnSpec::new("converted", "CONVERTED", "converted").format(Formatter::Boolean {
                yes: "yes".into(),
                no: "no".into(),
            }),
            ColumnSpec::new("created", "CREATED", "created_at")
                .format(Formatter::Timestamp(TimestampStyle::Relative)),
        ],
        actions: vec![BulkActionProfile {
            name: "convert",
            summary: "convert prospects into customers",
            endpoint: "/prospects/convert",
            extra: json!({}),
        }],
    }
}

fn activity() -> ScreenProfile {
    ScreenProfile {
        name: "activity",
        title: "Activity tracking",
        endpoint: "/activity-tracking",
        schema: FilterSchema::new()
            .search(["user.name", "employee.name", "current_app"])
            .category("status")
            .flag(
                "online",
                "Only users online now",
                Predicate::Equals {
                    path: "status".into(),
                    value: json!("online"),
                },
            )
            .date_field("last_seen"),
        columns: vec![
            ColumnSpec::new("user", "USER", "user.name").or("employee.name"),
            ColumnSpec::new("app", "APP", "current_app"),
            ColumnSpec::new("active", "ACTIVE", "active_seconds").format(Formatter::Duration),
            ColumnSpec::new("idle", "IDLE", "idle_seconds").format(Formatter::Duration),
            ColumnSpec::new("status", "STATUS", "status"),
            ColumnSpec::new("last_seen", "LAST SEEN", "last_seen")
                .format(Formatter::Timestamp(TimestampStyle::Relative)),
        ],
        actions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerdesk_grid::filter::{FilterState, apply};

    #[test]
    fn profiles_have_unique_names() {
        let names: Vec<&str> = profiles().iter().map(|profile| profile.name).collect();
        assert_eq!(names, vec!["employees", "attendance", "prospects", "activity"]);
        assert!(find("Employees").is_ok());
        let err = find("payroll").expect_err("unknown screen");
        assert!(matches!(err, CliError::Validation(message) if message.contains("attendance")));
    }

    #[test]
    fn employee_actions_add_status_to_payload() {
        let profile = find("employees").expect("profile");
        let action = profile.action("deactivate").expect("action");
        assert_eq!(
            action.payload(&[EntityId::from(3), EntityId::from("e-9")]),
            json!({"ids": [3, "e-9"], "status": "inactive"})
        );
        assert!(profile.action("archive").is_err());
        assert!(find("attendance").expect("profile").action("anything").is_err());
    }

    #[test]
    fn overtime_flag_reads_worked_seconds() {
        let profile = find("attendance").expect("profile");
        let rows: Vec<Record> = [
            json!({"id": 1, "worked_seconds": 30_000}),
            json!({"id": 2, "worked_seconds": 3_600}),
            json!({"id": 3}),
        ]
        .into_iter()
        .filter_map(Record::from_value)
        .collect();
        let mut state = FilterState::default();
        state.flags.insert("overtime".into());
        let visible: Vec<EntityId> = apply(&rows, &profile.schema, &state)
            .into_iter()
            .map(Entity::id)
            .collect();
        assert_eq!(visible, vec![EntityId::from(1)]);
    }
}

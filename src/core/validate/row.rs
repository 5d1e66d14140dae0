//! Per-entity row validation rule tables
//!
//! Composes the validation primitives in [`rules`](super::rules) into one
//! rule set per HUD entity table. Fields carrying the VAWA redaction marker
//! skip content checks: a redacted value is a policy outcome, not a data
//! quality defect.

use crate::core::generate::entities::{EntityKind, EntityRow};
use crate::core::generate::vawa::REDACTION_MARKER;
use crate::core::validate::diagnostic::ValidationDiagnostic;
use crate::core::validate::picklists::PicklistRegistry;
use crate::core::validate::rules::{
    validate_date_in_range, validate_date_sequence, validate_nullable_field,
    validate_picklist_code, RequirementFlag,
};
use crate::domain::period::ExportPeriod;
use chrono::NaiveDate;

/// Validates materialized rows against the HUD rule tables
pub struct RowValidator {
    period: ExportPeriod,
    today: NaiveDate,
    future_tolerance_days: i64,
    picklists: PicklistRegistry,
}

impl RowValidator {
    pub fn new(
        period: ExportPeriod,
        today: NaiveDate,
        future_tolerance_days: i64,
        picklists: PicklistRegistry,
    ) -> Self {
        Self {
            period,
            today,
            future_tolerance_days,
            picklists,
        }
    }

    /// Runs the entity's rule table against one row.
    pub fn validate_row(&self, row: &EntityRow) -> Vec<ValidationDiagnostic> {
        let ctx = row.row_context();
        match row.kind {
            EntityKind::Client => self.validate_client(row, &ctx),
            EntityKind::Enrollment => self.validate_enrollment(row, &ctx),
            EntityKind::Exit => self.validate_exit(row, &ctx),
            EntityKind::Services => self.validate_services(row, &ctx),
            EntityKind::CurrentLivingSituation => self.validate_current_living_situation(row, &ctx),
            EntityKind::IncomeBenefits => self.validate_income_benefits(row, &ctx),
            EntityKind::HealthAndDv => self.validate_health_and_dv(row, &ctx),
            EntityKind::Disabilities => self.validate_disabilities(row, &ctx),
        }
    }

    fn validate_client(&self, row: &EntityRow, ctx: &str) -> Vec<ValidationDiagnostic> {
        vec![
            self.required(row, "FirstName", ctx),
            self.required(row, "LastName", ctx),
            self.picklist(row, "NameDataQuality", "1.4 Name Data Quality", ctx),
            self.picklist(row, "SSNDataQuality", "1.5 SSN Data Quality", ctx),
            self.picklist(row, "DOBDataQuality", "1.6 DOB Data Quality", ctx),
        ]
    }

    fn validate_enrollment(&self, row: &EntityRow, ctx: &str) -> Vec<ValidationDiagnostic> {
        vec![
            self.date(row, "EntryDate", ctx),
            self.required(row, "RelationshipToHoH", ctx),
            self.picklist(row, "RelationshipToHoH", "1.27 Relationship to HoH", ctx),
            self.picklist(row, "DisablingCondition", "1.8 NoYesReasons", ctx),
            self.required(row, "LivingSituation", ctx),
            self.picklist(row, "LivingSituation", "3.917 Prior Living Situation", ctx),
            self.sequence(row, "EntryDate", "MoveInDate", true, ctx),
        ]
    }

    fn validate_exit(&self, row: &EntityRow, ctx: &str) -> Vec<ValidationDiagnostic> {
        vec![
            self.date(row, "ExitDate", ctx),
            self.required(row, "Destination", ctx),
            self.picklist(row, "Destination", "3.12 Destination", ctx),
            // EntryDate rides along from the enrollment join when available
            self.sequence(row, "EntryDate", "ExitDate", false, ctx),
        ]
    }

    fn validate_services(&self, row: &EntityRow, ctx: &str) -> Vec<ValidationDiagnostic> {
        vec![
            self.date(row, "DateProvided", ctx),
            self.required(row, "RecordType", ctx),
            self.required(row, "TypeProvided", ctx),
        ]
    }

    fn validate_current_living_situation(
        &self,
        row: &EntityRow,
        ctx: &str,
    ) -> Vec<ValidationDiagnostic> {
        vec![
            self.date(row, "InformationDate", ctx),
            self.required(row, "CurrentLivingSituation", ctx),
            self.picklist(
                row,
                "CurrentLivingSituation",
                "4.12 Current Living Situation",
                ctx,
            ),
        ]
    }

    fn validate_income_benefits(&self, row: &EntityRow, ctx: &str) -> Vec<ValidationDiagnostic> {
        vec![
            self.date(row, "InformationDate", ctx),
            self.picklist(row, "IncomeFromAnySource", "1.8 NoYesReasons", ctx),
            self.picklist(row, "BenefitsFromAnySource", "1.8 NoYesReasons", ctx),
            self.required(row, "DataCollectionStage", ctx),
        ]
    }

    fn validate_health_and_dv(&self, row: &EntityRow, ctx: &str) -> Vec<ValidationDiagnostic> {
        vec![
            self.date(row, "InformationDate", ctx),
            self.picklist(row, "DomesticViolenceVictim", "1.8 NoYesReasons", ctx),
            self.picklist(row, "CurrentlyFleeing", "1.8 NoYesReasons", ctx),
        ]
    }

    fn validate_disabilities(&self, row: &EntityRow, ctx: &str) -> Vec<ValidationDiagnostic> {
        vec![
            self.date(row, "InformationDate", ctx),
            self.required(row, "DisabilityType", ctx),
            self.picklist(row, "DisabilityType", "1.3 Disability Type", ctx),
            self.picklist(row, "DisabilityResponse", "4.10 Disability Response", ctx),
        ]
    }

    // Primitive wrappers that honor the redaction marker

    fn field<'a>(&self, row: &'a EntityRow, column: &str) -> Option<&'a str> {
        row.field(column)
    }

    fn required(&self, row: &EntityRow, column: &str, ctx: &str) -> ValidationDiagnostic {
        validate_nullable_field(column, self.field(row, column), RequirementFlag::Required, ctx)
    }

    fn date(&self, row: &EntityRow, column: &str, ctx: &str) -> ValidationDiagnostic {
        match self.field(row, column) {
            Some(REDACTION_MARKER) => ValidationDiagnostic::success(ctx, column),
            value => validate_date_in_range(
                column,
                value,
                &self.period,
                self.today,
                self.future_tolerance_days,
                ctx,
            ),
        }
    }

    fn picklist(
        &self,
        row: &EntityRow,
        column: &str,
        picklist_name: &str,
        ctx: &str,
    ) -> ValidationDiagnostic {
        if let Some(REDACTION_MARKER) = self.field(row, column) {
            return ValidationDiagnostic::success(ctx, column);
        }
        match self.picklists.get(picklist_name) {
            Some(codes) => validate_picklist_code(
                column,
                self.field(row, column),
                codes,
                picklist_name,
                ctx,
            ),
            // Unregistered picklist: nothing to check against
            None => ValidationDiagnostic::success(ctx, column),
        }
    }

    fn sequence(
        &self,
        row: &EntityRow,
        earlier_column: &str,
        later_column: &str,
        allow_equal: bool,
        ctx: &str,
    ) -> ValidationDiagnostic {
        let parse = |column: &str| -> Option<NaiveDate> {
            match self.field(row, column) {
                Some(REDACTION_MARKER) | None => None,
                Some(value) => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok(),
            }
        };
        validate_date_sequence(
            earlier_column,
            parse(earlier_column),
            later_column,
            parse(later_column),
            allow_equal,
            ctx,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validate::diagnostic::Severity;
    use std::collections::BTreeMap;

    fn validator() -> RowValidator {
        RowValidator::new(
            ExportPeriod::between(
                NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
            )
            .unwrap(),
            NaiveDate::from_ymd_opt(2024, 10, 15).unwrap(),
            30,
            PicklistRegistry::fy2024(),
        )
    }

    fn row(kind: EntityKind, fields: &[(&str, &str)]) -> EntityRow {
        EntityRow::new(
            kind,
            1,
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn errors(diagnostics: &[ValidationDiagnostic]) -> Vec<&str> {
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .filter_map(|d| d.error_code.as_deref())
            .collect()
    }

    #[test]
    fn test_valid_enrollment_row_passes() {
        let enrollment = row(
            EntityKind::Enrollment,
            &[
                ("EntryDate", "2024-01-10"),
                ("RelationshipToHoH", "1"),
                ("DisablingCondition", "0"),
                ("LivingSituation", "116"),
                ("MoveInDate", "2024-02-01"),
            ],
        );
        let diagnostics = validator().validate_row(&enrollment);
        assert!(errors(&diagnostics).is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn test_enrollment_missing_relationship() {
        let enrollment = row(
            EntityKind::Enrollment,
            &[("EntryDate", "2024-01-10"), ("LivingSituation", "116")],
        );
        let diagnostics = validator().validate_row(&enrollment);
        assert!(errors(&diagnostics).contains(&"REQUIRED_FIELD_NULL"));
    }

    #[test]
    fn test_enrollment_bad_picklist_code() {
        let enrollment = row(
            EntityKind::Enrollment,
            &[
                ("EntryDate", "2024-01-10"),
                ("RelationshipToHoH", "999"),
                ("LivingSituation", "116"),
            ],
        );
        let diagnostics = validator().validate_row(&enrollment);
        assert!(errors(&diagnostics).contains(&"PICKLIST_INVALID_CODE"));
    }

    #[test]
    fn test_exit_before_entry_is_sequence_violation() {
        let exit = row(
            EntityKind::Exit,
            &[
                ("EntryDate", "2024-06-15"),
                ("ExitDate", "2024-06-10"),
                ("Destination", "101"),
            ],
        );
        let diagnostics = validator().validate_row(&exit);
        assert!(errors(&diagnostics).contains(&"DATE_SEQUENCE_VIOLATION"));
    }

    #[test]
    fn test_same_day_exit_is_warning_only() {
        let exit = row(
            EntityKind::Exit,
            &[
                ("EntryDate", "2024-06-15"),
                ("ExitDate", "2024-06-15"),
                ("Destination", "101"),
            ],
        );
        let diagnostics = validator().validate_row(&exit);
        assert!(errors(&diagnostics).is_empty());
        assert!(diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning
                && d.error_code.as_deref() == Some("DATE_SEQUENCE_EQUAL")));
    }

    #[test]
    fn test_redacted_fields_skip_content_checks() {
        let health = row(
            EntityKind::HealthAndDv,
            &[
                ("InformationDate", "2024-03-01"),
                ("DomesticViolenceVictim", REDACTION_MARKER),
                ("CurrentlyFleeing", REDACTION_MARKER),
            ],
        );
        let diagnostics = validator().validate_row(&health);
        assert!(errors(&diagnostics).is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn test_client_row_rules() {
        let client = row(
            EntityKind::Client,
            &[
                ("FirstName", "Ada"),
                ("LastName", "Lovelace"),
                ("NameDataQuality", "1"),
                ("SSNDataQuality", "1"),
                ("DOBDataQuality", "42"),
            ],
        );
        let diagnostics = validator().validate_row(&client);
        assert_eq!(errors(&diagnostics), vec!["PICKLIST_INVALID_CODE"]);
    }
}

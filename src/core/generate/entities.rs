//! HUD entity tables and their CSV column catalogs
//!
//! One CSV file per entity table goes into the export bundle. Column names
//! and order follow the HUD HMIS CSV Format specification; the column set
//! is version-gated because FY2024 restructured the Client gender and race
//! columns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// HUD CSV specification version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsvVersion {
    Fy2022,
    Fy2024,
}

impl CsvVersion {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FY2022" => Some(CsvVersion::Fy2022),
            "FY2024" => Some(CsvVersion::Fy2024),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CsvVersion::Fy2022 => "FY2022",
            CsvVersion::Fy2024 => "FY2024",
        }
    }
}

impl fmt::Display for CsvVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HUD entity tables emitted into the export bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Client,
    Enrollment,
    Exit,
    Services,
    CurrentLivingSituation,
    IncomeBenefits,
    HealthAndDv,
    Disabilities,
}

impl EntityKind {
    /// All entity tables, in bundle emission order
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Client,
        EntityKind::Enrollment,
        EntityKind::Exit,
        EntityKind::Services,
        EntityKind::CurrentLivingSituation,
        EntityKind::IncomeBenefits,
        EntityKind::HealthAndDv,
        EntityKind::Disabilities,
    ];

    /// CSV section name as it appears in file names and row contexts
    pub fn section_name(&self) -> &'static str {
        match self {
            EntityKind::Client => "Client",
            EntityKind::Enrollment => "Enrollment",
            EntityKind::Exit => "Exit",
            EntityKind::Services => "Services",
            EntityKind::CurrentLivingSituation => "CurrentLivingSituation",
            EntityKind::IncomeBenefits => "IncomeBenefits",
            EntityKind::HealthAndDv => "HealthAndDV",
            EntityKind::Disabilities => "Disabilities",
        }
    }

    /// File name inside the export bundle
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.section_name())
    }

    /// HUD-mandated column order for this table under the given spec version
    pub fn columns(&self, version: CsvVersion) -> Vec<&'static str> {
        match self {
            EntityKind::Client => client_columns(version),
            EntityKind::Enrollment => vec![
                "EnrollmentID",
                "PersonalID",
                "ProjectID",
                "EntryDate",
                "HouseholdID",
                "RelationshipToHoH",
                "EnrollmentCoC",
                "LivingSituation",
                "LOSUnderThreshold",
                "PreviousStreetESSH",
                "DateToStreetESSH",
                "TimesHomelessPastThreeYears",
                "MonthsHomelessPastThreeYears",
                "DisablingCondition",
                "DateOfEngagement",
                "MoveInDate",
                "DateCreated",
                "DateUpdated",
                "UserID",
                "DateDeleted",
                "ExportID",
            ],
            EntityKind::Exit => vec![
                "ExitID",
                "EnrollmentID",
                "PersonalID",
                "ExitDate",
                "Destination",
                "OtherDestination",
                "HousingAssessment",
                "SubsidyInformation",
                "ProjectCompletionStatus",
                "DestinationSafeClient",
                "DestinationSafeWorker",
                "DateCreated",
                "DateUpdated",
                "UserID",
                "DateDeleted",
                "ExportID",
            ],
            EntityKind::Services => vec![
                "ServicesID",
                "EnrollmentID",
                "PersonalID",
                "DateProvided",
                "RecordType",
                "TypeProvided",
                "OtherTypeProvided",
                "SubTypeProvided",
                "FAAmount",
                "ReferralOutcome",
                "DateCreated",
                "DateUpdated",
                "UserID",
                "DateDeleted",
                "ExportID",
            ],
            EntityKind::CurrentLivingSituation => vec![
                "CurrentLivingSitID",
                "EnrollmentID",
                "PersonalID",
                "InformationDate",
                "CurrentLivingSituation",
                "VerifiedBy",
                "LeaveSituation14Days",
                "SubsequentResidence",
                "ResourcesToObtain",
                "LeaseOwn60Day",
                "MovedTwoOrMore",
                "LocationDetails",
                "DateCreated",
                "DateUpdated",
                "UserID",
                "DateDeleted",
                "ExportID",
            ],
            EntityKind::IncomeBenefits => vec![
                "IncomeBenefitsID",
                "EnrollmentID",
                "PersonalID",
                "InformationDate",
                "IncomeFromAnySource",
                "TotalMonthlyIncome",
                "Earned",
                "EarnedAmount",
                "Unemployment",
                "UnemploymentAmount",
                "SSI",
                "SSIAmount",
                "SSDI",
                "SSDIAmount",
                "TANF",
                "TANFAmount",
                "GA",
                "GAAmount",
                "SocSecRetirement",
                "SocSecRetirementAmount",
                "Pension",
                "PensionAmount",
                "ChildSupport",
                "ChildSupportAmount",
                "OtherIncomeSource",
                "OtherIncomeAmount",
                "OtherIncomeSourceIdentify",
                "BenefitsFromAnySource",
                "SNAP",
                "WIC",
                "InsuranceFromAnySource",
                "Medicaid",
                "Medicare",
                "SCHIP",
                "PrivatePay",
                "StateHealthIns",
                "OtherInsurance",
                "OtherInsuranceIdentify",
                "DataCollectionStage",
                "DateCreated",
                "DateUpdated",
                "UserID",
                "DateDeleted",
                "ExportID",
            ],
            EntityKind::HealthAndDv => vec![
                "HealthAndDVID",
                "EnrollmentID",
                "PersonalID",
                "InformationDate",
                "DomesticViolenceVictim",
                "WhenOccurred",
                "CurrentlyFleeing",
                "GeneralHealthStatus",
                "DentalHealthStatus",
                "MentalHealthStatus",
                "PregnancyStatus",
                "DueDate",
                "DataCollectionStage",
                "DateCreated",
                "DateUpdated",
                "UserID",
                "DateDeleted",
                "ExportID",
            ],
            EntityKind::Disabilities => vec![
                "DisabilitiesID",
                "EnrollmentID",
                "PersonalID",
                "InformationDate",
                "DisabilityType",
                "DisabilityResponse",
                "IndefiniteAndImpairs",
                "TCellCount",
                "TCellSource",
                "ViralLoadAvailable",
                "ViralLoad",
                "AntiRetroviral",
                "DataCollectionStage",
                "DateCreated",
                "DateUpdated",
                "UserID",
                "DateDeleted",
                "ExportID",
            ],
        }
    }

    /// Columns carrying direct identifiers, one-way hashed in hashed mode
    pub fn direct_identifier_columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Client => &[
                "FirstName",
                "MiddleName",
                "LastName",
                "NameSuffix",
                "SSN",
                "DOB",
            ],
            _ => &[],
        }
    }

    /// Columns containing VAWA-sensitive values, redacted for protected subjects
    pub fn vawa_sensitive_columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::CurrentLivingSituation => &["LocationDetails"],
            EntityKind::HealthAndDv => &["DomesticViolenceVictim", "WhenOccurred", "CurrentlyFleeing"],
            EntityKind::Exit => &["Destination", "OtherDestination"],
            _ => &[],
        }
    }
}

fn client_columns(version: CsvVersion) -> Vec<&'static str> {
    let mut columns = vec![
        "PersonalID",
        "FirstName",
        "MiddleName",
        "LastName",
        "NameSuffix",
        "NameDataQuality",
        "SSN",
        "SSNDataQuality",
        "DOB",
        "DOBDataQuality",
        "AmIndAKNative",
        "Asian",
        "BlackAfAmerican",
        "NativeHIPacific",
        "White",
        "RaceNone",
    ];

    match version {
        CsvVersion::Fy2022 => {
            columns.extend(["Female", "Male", "NoSingleGender", "Transgender", "Questioning", "GenderNone"]);
        }
        CsvVersion::Fy2024 => {
            // FY2024 restructured gender and added race/ethnicity detail
            columns.extend([
                "AdditionalRaceEthnicity",
                "Woman",
                "Man",
                "NonBinary",
                "CulturallySpecific",
                "Transgender",
                "Questioning",
                "DifferentIdentity",
                "GenderNone",
                "DifferentIdentityText",
            ]);
        }
    }

    columns.extend(["DateCreated", "DateUpdated", "UserID", "DateDeleted", "ExportID"]);
    columns
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.section_name())
    }
}

/// One materialized row for one entity table
///
/// Field values are kept as optional strings keyed by CSV column name; the
/// CSV encoder orders them by the entity's column catalog. The row context
/// is the anonymized positional label used in every diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    pub kind: EntityKind,
    /// 1-based position within the section
    pub index: usize,
    pub fields: BTreeMap<String, Option<String>>,
}

impl EntityRow {
    pub fn new(kind: EntityKind, index: usize, fields: BTreeMap<String, Option<String>>) -> Self {
        Self {
            kind,
            index,
            fields,
        }
    }

    /// Anonymized positional label, e.g. "Enrollment row 42"
    pub fn row_context(&self) -> String {
        format!("{} row {}", self.kind.section_name(), self.index)
    }

    pub fn field(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(|v| v.as_deref())
    }

    pub fn set_field(&mut self, column: &str, value: Option<String>) {
        self.fields.insert(column.to_string(), value);
    }
}

/// All rows for one entity table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySection {
    pub kind: EntityKind,
    pub rows: Vec<EntityRow>,
}

impl EntitySection {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fy2024_client_gender_columns() {
        let columns = EntityKind::Client.columns(CsvVersion::Fy2024);
        assert!(columns.contains(&"Woman"));
        assert!(columns.contains(&"CulturallySpecific"));
        assert!(columns.contains(&"AdditionalRaceEthnicity"));
        assert!(!columns.contains(&"Female"));
    }

    #[test]
    fn test_fy2022_client_gender_columns() {
        let columns = EntityKind::Client.columns(CsvVersion::Fy2022);
        assert!(columns.contains(&"Female"));
        assert!(!columns.contains(&"Woman"));
        assert!(!columns.contains(&"AdditionalRaceEthnicity"));
    }

    #[test]
    fn test_every_table_carries_export_id() {
        for kind in EntityKind::ALL {
            let columns = kind.columns(CsvVersion::Fy2024);
            assert_eq!(*columns.last().unwrap(), "ExportID", "{kind}");
        }
    }

    #[test]
    fn test_row_context_label() {
        let row = EntityRow::new(EntityKind::Enrollment, 42, BTreeMap::new());
        assert_eq!(row.row_context(), "Enrollment row 42");
    }

    #[test]
    fn test_csv_version_parse() {
        assert_eq!(CsvVersion::parse("FY2024"), Some(CsvVersion::Fy2024));
        assert_eq!(CsvVersion::parse("FY2020"), None);
    }
}

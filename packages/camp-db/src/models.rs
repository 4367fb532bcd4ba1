//! Modelos de dados do atendimento
//!
//! Este módulo define as estruturas gravadas no banco, as visões compostas
//! devolvidas pela API e os dados de entrada validados.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Gera um identificador interno para novos registros
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Padrão `LIKE` de substring; `%`, `_` e `\` do termo valem como texto.
/// Usar com `ESCAPE '\'`.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Situação de um atendimento ao longo do fluxo do mutirão
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Paciente cadastrado, exames pendentes
    Registered,
    /// Todos os exames solicitados têm resultado
    TestsDone,
    /// Ao menos um medicamento foi dispensado
    MedicinesIssued,
    /// Atendimento encerrado
    Completed,
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Registered => write!(f, "registered"),
            RegistrationStatus::TestsDone => write!(f, "tests_done"),
            RegistrationStatus::MedicinesIssued => write!(f, "medicines_issued"),
            RegistrationStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(RegistrationStatus::Registered),
            "tests_done" => Ok(RegistrationStatus::TestsDone),
            "medicines_issued" => Ok(RegistrationStatus::MedicinesIssued),
            "completed" => Ok(RegistrationStatus::Completed),
            other => Err(format!("Valor de status inválido: {}", other)),
        }
    }
}

/// Classificação de um resultado de exame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TestResultStatus {
    #[default]
    Normal,
    Abnormal,
    Critical,
}

impl std::fmt::Display for TestResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestResultStatus::Normal => write!(f, "normal"),
            TestResultStatus::Abnormal => write!(f, "abnormal"),
            TestResultStatus::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for TestResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(TestResultStatus::Normal),
            "abnormal" => Ok(TestResultStatus::Abnormal),
            "critical" => Ok(TestResultStatus::Critical),
            other => Err(format!("Valor de status inválido: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Linhas das tabelas
// ---------------------------------------------------------------------------

/// Paciente, identificado pelo código legível impresso no QR code
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub address: String,
    pub contact_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i64>,
    pub gender: String,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub bmi: Option<f64>,
    pub blood_pressure: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Uma visita do paciente
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub patient_id: String,
    pub status: RegistrationStatus,
    /// Data-URL PNG gerada na primeira consulta do QR code
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TestType {
    pub id: String,
    pub name: String,
    pub requires_result: bool,
    pub requires_print_sheet: bool,
    pub requires_barcode: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Exame solicitado em um atendimento
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationTest {
    pub id: String,
    pub registration_id: String,
    pub test_type_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub registration_id: String,
    pub test_type_id: String,
    pub result: String,
    pub normal_range: Option<String>,
    pub status: TestResultStatus,
    pub entered_by: Option<String>,
    pub entered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dispensação de medicamento; `medicine_id` nulo indica item avulso
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MedicineIssue {
    pub id: String,
    pub registration_id: String,
    pub medicine_id: Option<String>,
    pub custom_medicine: Option<String>,
    pub quantity: i64,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
    pub issued_by: Option<String>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SatisfactionRating {
    pub id: String,
    pub rating: i64,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub category: String,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Visões compostas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationTestView {
    #[serde(flatten)]
    pub registration_test: RegistrationTest,
    pub test_type: TestType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultView {
    #[serde(flatten)]
    pub test_result: TestResult,
    pub test_type: TestType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineIssueView {
    #[serde(flatten)]
    pub medicine_issue: MedicineIssue,
    pub medicine: Option<Medicine>,
}

/// Atendimento com os exames solicitados
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationWithTests {
    #[serde(flatten)]
    pub registration: Registration,
    pub registration_tests: Vec<RegistrationTestView>,
}

/// Atendimento completo: exames, resultados e dispensações
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    #[serde(flatten)]
    pub registration: Registration,
    pub registration_tests: Vec<RegistrationTestView>,
    pub test_results: Vec<TestResultView>,
    pub medicine_issues: Vec<MedicineIssueView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationWithPatient {
    #[serde(flatten)]
    pub registration: Registration,
    pub patient: Patient,
}

/// Atendimento com paciente e exames, como devolvido pela busca por código
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDetail {
    #[serde(flatten)]
    pub registration: Registration,
    pub patient: Patient,
    pub registration_tests: Vec<RegistrationTestView>,
}

/// Paciente com o histórico de atendimentos resumido (busca)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[serde(flatten)]
    pub patient: Patient,
    pub registrations: Vec<RegistrationWithTests>,
}

/// Prontuário completo do paciente
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    #[serde(flatten)]
    pub patient: Patient,
    pub registrations: Vec<RegistrationRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultDetail {
    #[serde(flatten)]
    pub test_result: TestResult,
    pub test_type: TestType,
    pub registration: RegistrationWithPatient,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineIssueDetail {
    #[serde(flatten)]
    pub medicine_issue: MedicineIssue,
    pub medicine: Option<Medicine>,
    pub registration: RegistrationWithPatient,
}

/// Atendimento com exames ainda sem resultado
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub id: String,
    pub patient: Patient,
    pub created_at: DateTime<Utc>,
    pub status: RegistrationStatus,
    pub pending_tests: Vec<RegistrationTestView>,
    pub completed_tests: Vec<TestResultView>,
}

/// Metadados de paginação
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// Página solicitada; valores fora do intervalo são ajustados
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(10).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// ---------------------------------------------------------------------------
// Dados de entrada
// ---------------------------------------------------------------------------

/// Texto que continua vazio depois do `trim` não é aceito
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Cadastro de paciente e abertura do atendimento
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistration {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Nome é obrigatório"))]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub contact_number: String,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(range(min = 0, max = 150))]
    pub age: Option<i64>,
    #[serde(default)]
    pub gender: String,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub bmi: Option<f64>,
    #[serde(default)]
    pub blood_pressure: String,
    /// IDs dos tipos de exame solicitados
    #[serde(default)]
    pub selected_tests: Vec<String>,
}

/// Atualização parcial dos dados do paciente
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    #[validate(custom(function = "not_blank", message = "Nome não pode ser vazio"))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub contact_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(range(min = 0, max = 150))]
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub bmi: Option<f64>,
    pub blood_pressure: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestTypeInput {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Nome é obrigatório"))]
    pub name: String,
    #[serde(default)]
    pub requires_result: bool,
    #[serde(default)]
    pub requires_print_sheet: bool,
    #[serde(default)]
    pub requires_barcode: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewTestResult {
    #[serde(default)]
    #[validate(length(min = 1, message = "ID do atendimento é obrigatório"))]
    pub registration_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "ID do tipo de exame é obrigatório"))]
    pub test_type_id: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Resultado é obrigatório"))]
    pub result: String,
    pub normal_range: Option<String>,
    pub status: Option<TestResultStatus>,
    pub entered_by: Option<String>,
}

/// Alterações em um resultado; campos ausentes são mantidos
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TestResultUpdate {
    #[validate(custom(function = "not_blank", message = "Resultado não pode ser vazio"))]
    pub result: Option<String>,
    pub normal_range: Option<String>,
    pub status: Option<TestResultStatus>,
    pub entered_by: Option<String>,
}

/// Atualização endereçada pelo par (atendimento, tipo de exame)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct KeyedTestResultUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "ID do atendimento é obrigatório"))]
    pub registration_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "ID do tipo de exame é obrigatório"))]
    pub test_type_id: String,
    #[validate(custom(function = "not_blank", message = "Resultado não pode ser vazio"))]
    pub result: Option<String>,
    pub normal_range: Option<String>,
    pub status: Option<TestResultStatus>,
    pub entered_by: Option<String>,
}

impl KeyedTestResultUpdate {
    pub fn changes(&self) -> TestResultUpdate {
        TestResultUpdate {
            result: self.result.clone(),
            normal_range: self.normal_range.clone(),
            status: self.status,
            entered_by: self.entered_by.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MedicineInput {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Nome é obrigatório"))]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "Estoque não pode ser negativo"))]
    pub stock: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewMedicineIssue {
    #[serde(default)]
    #[validate(length(min = 1, message = "ID do atendimento é obrigatório"))]
    pub registration_id: String,
    pub medicine_id: Option<String>,
    pub custom_medicine: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Quantidade deve ser maior que zero"))]
    pub quantity: i64,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
    pub issued_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MedicineIssueUpdate {
    #[validate(range(min = 1, message = "Quantidade deve ser maior que zero"))]
    pub quantity: Option<i64>,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
    pub issued_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewSatisfactionRating {
    #[serde(default)]
    #[validate(range(min = 1, max = 5, message = "Avaliação deve estar entre 1 e 5"))]
    pub rating: i64,
    pub feedback: Option<String>,
}

/// Gravação de uma configuração
#[derive(Debug, Clone, Default)]
pub struct SettingWrite {
    pub key: String,
    pub value: String,
    pub category: Option<String>,
    pub updated_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        let registration = NewRegistration {
            name: "   ".to_string(),
            ..Default::default()
        };
        let errors = registration.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));

        let medicine = MedicineInput {
            name: "\t".to_string(),
            ..Default::default()
        };
        assert!(medicine.validate().is_err());

        let update = PatientUpdate {
            name: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn padded_names_are_accepted() {
        let test_type = TestTypeInput {
            name: "  RBS ".to_string(),
            ..Default::default()
        };
        assert!(test_type.validate().is_ok());
        assert!(PatientUpdate::default().validate().is_ok());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(contains_pattern("Ana"), "%Ana%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn page_request_clamps_limit() {
        let page = PageRequest::new(Some(0), Some(500));
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 100);
        assert_eq!(page.offset(), 0);
    }
}

//! The payment record moved by both steps.
//!
//! Attribute names follow the source JSON (`pisPasep`, `valorPagamento`,
//! `nomeMae`, ...). Identifier attributes are kept as text, whatever JSON
//! type they arrive with, so that defects in them are reported by the
//! export step instead of being lost at import.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "identificacaoRegistro", default, deserialize_with = "opt_text")]
    pub registration_id: Option<String>,
    #[serde(rename = "codigoPagamento", deserialize_with = "text")]
    pub payment_code: String,
    #[serde(rename = "exercicioFinanceiro", default, deserialize_with = "opt_text")]
    pub fiscal_year: Option<String>,
    #[serde(rename = "anoBase", default, deserialize_with = "opt_text")]
    pub base_year: Option<String>,

    // Worker
    #[serde(rename = "pisPasep", deserialize_with = "text")]
    pub pis_pasep: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "nascimento", default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "cpf", deserialize_with = "text")]
    pub cpf: String,
    #[serde(rename = "nomeMae", default)]
    pub mother_name: String,

    // Payment detail
    #[serde(rename = "numeroParcela", default, deserialize_with = "opt_text")]
    pub installment: Option<String>,
    #[serde(rename = "valorPagamento")]
    pub amount: i64,
    #[serde(rename = "mesesTrabalhados", default)]
    pub months_worked: i64,
    #[serde(rename = "dataInicialPagamento", default)]
    pub payment_start: Option<NaiveDate>,
    #[serde(rename = "dataFinalPagamento", default)]
    pub payment_end: Option<NaiveDate>,
    #[serde(rename = "numeroSentenca", default, deserialize_with = "opt_text")]
    pub judicial_order: Option<String>,

    // Bank
    #[serde(rename = "banco", deserialize_with = "text")]
    pub bank: String,
    #[serde(rename = "agencia", deserialize_with = "text")]
    pub branch: String,
    #[serde(rename = "digitoVerificador", default, deserialize_with = "text")]
    pub check_digit: String,
    #[serde(rename = "tipoConta", default, deserialize_with = "text")]
    pub account_type: String,
    #[serde(rename = "conta", deserialize_with = "text")]
    pub account: String,
    #[serde(rename = "indicadorPagamento", default, deserialize_with = "text")]
    pub payment_indicator: String,
}

impl Payment {
    /// Single-line JSON rendering, as written to the error side files.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<TextOrNumber> for String {
    fn from(raw: TextOrNumber) -> Self {
        match raw {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Unsigned(n) => n.to_string(),
            TextOrNumber::Signed(n) => n.to_string(),
        }
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    TextOrNumber::deserialize(deserializer).map(String::from)
}

fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<TextOrNumber>::deserialize(deserializer)?.map(String::from))
}

#[cfg(test)]
pub(crate) fn sample_payment() -> Payment {
    Payment {
        registration_id: Some("21".to_string()),
        payment_code: "1001".to_string(),
        fiscal_year: None,
        base_year: None,
        pis_pasep: "12345678901".to_string(),
        name: "JOAO DA SILVA".to_string(),
        birth_date: NaiveDate::from_ymd_opt(1985, 3, 9),
        cpf: "98765432100".to_string(),
        mother_name: "MARIA DA SILVA".to_string(),
        installment: None,
        amount: 500,
        months_worked: 12,
        payment_start: None,
        payment_end: None,
        judicial_order: None,
        bank: "104".to_string(),
        branch: "1234".to_string(),
        check_digit: "7".to_string(),
        account_type: "1".to_string(),
        account: "567890".to_string(),
        payment_indicator: "1".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_source_attributes() {
        let json = r#"{
            "codigoPagamento": 1001,
            "pisPasep": "12345678901",
            "nome": "JOAO DA SILVA",
            "nascimento": "1985-03-09",
            "cpf": 98765432100,
            "nomeMae": "",
            "valorPagamento": 500,
            "mesesTrabalhados": 12,
            "banco": "104",
            "agencia": 1234,
            "digitoVerificador": "7",
            "tipoConta": 1,
            "conta": "567890",
            "indicadorPagamento": "1"
        }"#;
        let payment: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.payment_code, "1001");
        assert_eq!(payment.cpf, "98765432100");
        assert_eq!(payment.branch, "1234");
        assert_eq!(payment.account_type, "1");
        assert_eq!(payment.amount, 500);
        assert_eq!(payment.birth_date, NaiveDate::from_ymd_opt(1985, 3, 9));
        assert_eq!(payment.mother_name, "");
        assert!(payment.fiscal_year.is_none());
        assert!(payment.payment_start.is_none());
    }

    #[test]
    fn test_missing_required_attribute_fails() {
        let json = r#"{"codigoPagamento": "1", "nome": "X"}"#;
        assert!(serde_json::from_str::<Payment>(json).is_err());
    }

    #[test]
    fn test_json_line_is_single_line() {
        let line = sample_payment().to_json_line();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"pisPasep\":\"12345678901\""));
        let back: Payment = serde_json::from_str(&line).unwrap();
        assert_eq!(back, sample_payment());
    }
}

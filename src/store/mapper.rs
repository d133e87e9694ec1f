//! Row to payment mapping for the export step.

use super::{Row, Value};
use crate::error::{BatchError, Result};
use crate::payment::Payment;
use chrono::NaiveDate;

pub trait RowMapper<T> {
    fn map_row(&self, row: &Row) -> Result<T>;
}

/// Maps one row of the export join back into a [`Payment`].
///
/// A missing column, a value of the wrong type or an unreadable date is a
/// `Parse` error whose raw input is the whole row as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentRowMapper;

impl RowMapper<Payment> for PaymentRowMapper {
    fn map_row(&self, row: &Row) -> Result<Payment> {
        let cols = Columns(row);
        Ok(Payment {
            registration_id: cols.opt_text("identificacao_registro")?,
            payment_code: cols.text("codigo_pagamento")?,
            fiscal_year: cols.opt_text("exercicio_financeiro")?,
            base_year: cols.opt_text("ano_base")?,
            pis_pasep: cols.text("pis_pasep")?,
            name: cols.text("nome")?,
            birth_date: cols.date("nascimento")?,
            cpf: cols.text("cpf")?,
            mother_name: cols.opt_text("nome_mae")?.unwrap_or_default(),
            installment: cols.opt_text("numero_parcela")?,
            amount: cols.integer("valor_pagamento")?,
            months_worked: cols.opt_integer("meses_trabalhados")?.unwrap_or_default(),
            payment_start: cols.date("data_inicial_pagamento")?,
            payment_end: cols.date("data_final_pagamento")?,
            judicial_order: cols.opt_text("numero_sentenca")?,
            bank: cols.text("codigo_banco")?,
            branch: cols.text("agencia")?,
            check_digit: cols.opt_text("digito_verificador")?.unwrap_or_default(),
            account_type: cols.opt_text("tipo_conta")?.unwrap_or_default(),
            account: cols.text("conta")?,
            payment_indicator: cols.opt_text("indicador_pagamento")?.unwrap_or_default(),
        })
    }
}

struct Columns<'r>(&'r Row);

impl Columns<'_> {
    fn fail(&self, column: &str, reason: &str) -> BatchError {
        BatchError::parse(self.0.to_json(), format!("column `{column}`: {reason}"))
    }

    fn value(&self, column: &str) -> Result<&Value> {
        self.0.get(column).ok_or_else(|| self.fail(column, "missing"))
    }

    fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            Value::Integer(i) => Ok(Some(i.to_string())),
            Value::Real(_) => Err(self.fail(column, "expected text, found real")),
        }
    }

    fn text(&self, column: &str) -> Result<String> {
        self.opt_text(column)?
            .ok_or_else(|| self.fail(column, "unexpected null"))
    }

    fn opt_integer(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.fail(column, "expected integer")),
            Value::Real(_) => Err(self.fail(column, "expected integer, found real")),
        }
    }

    fn integer(&self, column: &str) -> Result<i64> {
        self.opt_integer(column)?
            .ok_or_else(|| self.fail(column, "unexpected null"))
    }

    fn date(&self, column: &str) -> Result<Option<NaiveDate>> {
        match self.opt_text(column)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Some)
                .map_err(|e| self.fail(column, &format!("bad date {s:?}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::sample_payment;
    use crate::store::{EXPORT_QUERY, PaymentRepository, SqliteRepository};

    fn stored_row() -> Row {
        let mut repo = SqliteRepository::in_memory().unwrap();
        repo.save(&sample_payment()).unwrap();
        repo.query(EXPORT_QUERY).unwrap().remove(0)
    }

    #[test]
    fn test_maps_joined_row() {
        let payment = PaymentRowMapper.map_row(&stored_row()).unwrap();
        assert_eq!(payment, sample_payment());
    }

    #[test]
    fn test_null_required_column_is_parse_error() {
        let mut row = stored_row();
        row.insert("cpf", Value::Null);
        let err = PaymentRowMapper.map_row(&row).unwrap_err();
        assert!(matches!(err, BatchError::Parse { .. }));
        assert!(err.to_string().contains("cpf"));
        assert_eq!(err.raw_input(), Some(row.to_json().as_str()));
    }

    #[test]
    fn test_bad_date_is_parse_error() {
        let row = stored_row().with("nascimento", Value::Text("09/03/1985".into()));
        let err = PaymentRowMapper.map_row(&row).unwrap_err();
        assert!(err.to_string().contains("nascimento"));
    }

    #[test]
    fn test_numeric_text_columns() {
        let row = stored_row()
            .with("pis_pasep", Value::Integer(12345678901))
            .with("valor_pagamento", Value::Text("250".into()));
        let payment = PaymentRowMapper.map_row(&row).unwrap();
        assert_eq!(payment.pis_pasep, "12345678901");
        assert_eq!(payment.amount, 250);
    }

    #[test]
    fn test_empty_row_fails() {
        assert!(PaymentRowMapper.map_row(&Row::new()).is_err());
    }
}

//! Payment to fixed-width report line.
//!
//! [`ReportTransformer`] validates and pads every field of a payment in
//! layout order, [`FixedWidthLineAggregator`] concatenates the fields with
//! an empty delimiter and rejects overflowing values, and [`ReportTrailer`]
//! synthesizes the header and the footer (record count and total amount).

use crate::error::{BatchError, Result};
use crate::flat_file::{FlatFileCallback, LineAggregator};
use crate::format::{
    DATE_FORMAT, FieldKind, check_numeric, fit_field, format_date, format_field,
    format_mother_name,
};
use crate::item::ItemProcessor;
use crate::layout::{FIELD_COUNT, FieldSpec, ReportLayout};
use crate::payment::Payment;
use chrono::NaiveDate;
use std::borrow::Cow;

/// One detail record, already padded field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    fields: Vec<String>,
    amount: u64,
}

impl ReportLine {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Payment amount carried into the footer total.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Fields concatenated without any width check.
    pub fn raw_line(&self) -> String {
        self.fields.concat()
    }
}

enum Cell<'p> {
    Value(Cow<'p, str>),
    MotherName(&'p str),
}

fn value(s: &str) -> Cell<'_> {
    Cell::Value(Cow::Borrowed(s))
}

fn or_default<'p>(v: &'p Option<String>, default: &'p str) -> Cell<'p> {
    match v.as_deref() {
        Some(s) if !s.trim().is_empty() => value(s),
        _ => value(default),
    }
}

fn date_or_default<'p>(
    field: &str,
    date: Option<NaiveDate>,
    default: &'p str,
) -> Result<Cell<'p>> {
    match date {
        Some(_) => Ok(Cell::Value(Cow::Owned(format_date(field, date)?))),
        None => Ok(value(default)),
    }
}

pub struct ReportTransformer<'a> {
    layout: &'a ReportLayout,
}

impl<'a> ReportTransformer<'a> {
    pub fn new(layout: &'a ReportLayout) -> Self {
        Self { layout }
    }

    pub fn transform(&self, p: &Payment) -> Result<ReportLine> {
        let layout = self.layout;
        let d = &layout.defaults;

        let cells: [Cell; FIELD_COUNT] = [
            value(&layout.detail_code),
            value(&p.payment_code),
            or_default(&p.fiscal_year, &d.fiscal_year),
            or_default(&p.base_year, &d.base_year),
            value(&p.pis_pasep),
            value(&p.name),
            Cell::Value(Cow::Owned(format_date("nascimento", p.birth_date)?)),
            value(&p.cpf),
            Cell::MotherName(&p.mother_name),
            or_default(&p.installment, &d.installment),
            Cell::Value(Cow::Owned(p.amount.to_string())),
            Cell::Value(Cow::Owned(p.months_worked.to_string())),
            date_or_default("dataInicialPagamento", p.payment_start, &d.payment_start)?,
            date_or_default("dataFinalPagamento", p.payment_end, &d.payment_end)?,
            or_default(&p.judicial_order, &d.judicial_order),
            value(&p.bank),
            value(&p.branch),
            value(&p.check_digit),
            value(&p.account_type),
            value(&p.account),
            value(&p.payment_indicator),
            value("0"),
        ];

        let fields = cells
            .iter()
            .zip(&layout.fields)
            .map(|(cell, spec)| self.render(cell, spec))
            .collect::<Result<Vec<_>>>()?;

        Ok(ReportLine {
            fields,
            amount: p.amount.unsigned_abs(),
        })
    }

    fn render(&self, cell: &Cell, spec: &FieldSpec) -> Result<String> {
        match cell {
            Cell::MotherName(name) => {
                check_text(spec.name, name)?;
                Ok(format_mother_name(
                    name,
                    spec.width,
                    &self.layout.mother_name_placeholder,
                ))
            }
            Cell::Value(v) => {
                match spec.kind {
                    FieldKind::Numeric => check_numeric(spec.name, v)?,
                    FieldKind::Text => check_text(spec.name, v)?,
                }
                Ok(format_field(&**v, spec.width, spec.kind))
            }
        }
    }
}

fn check_text(field: &str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(BatchError::format(field, value, "line break in text field"));
    }
    Ok(())
}

impl ItemProcessor<Payment, ReportLine> for ReportTransformer<'_> {
    fn process(&self, item: &Payment) -> Result<ReportLine> {
        self.transform(item)
    }
}

/// Concatenates the fields of a line, enforcing every field width.
pub struct FixedWidthLineAggregator<'a> {
    layout: &'a ReportLayout,
}

impl<'a> FixedWidthLineAggregator<'a> {
    pub fn new(layout: &'a ReportLayout) -> Self {
        Self { layout }
    }
}

impl LineAggregator<ReportLine> for FixedWidthLineAggregator<'_> {
    fn aggregate(&self, item: &ReportLine) -> Result<String> {
        let line = item.raw_line();
        if item.fields.len() != self.layout.fields.len() {
            return Err(BatchError::Format {
                field: "record".to_string(),
                value: item.fields.len().to_string(),
                reason: format!("expected {} fields", self.layout.fields.len()),
                line: Some(line),
            });
        }

        for (field, spec) in item.fields.iter().zip(&self.layout.fields) {
            let width = field.chars().count();
            if width != spec.width {
                return Err(BatchError::Format {
                    field: spec.name.to_string(),
                    value: field.clone(),
                    reason: format!("{width} characters do not fit width {}", spec.width),
                    line: Some(line),
                });
            }
        }
        Ok(line)
    }
}

/// Header and footer records; the footer totals what was actually written.
pub struct ReportTrailer<'a> {
    layout: &'a ReportLayout,
    run_date: NaiveDate,
    count: u64,
    total: u64,
}

impl<'a> ReportTrailer<'a> {
    pub fn new(layout: &'a ReportLayout, run_date: NaiveDate) -> Self {
        Self {
            layout,
            run_date,
            count: 0,
            total: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    fn fill_record(&self, record: &str, prefix: String) -> Result<String> {
        let width = self.layout.record_length();
        let len = prefix.chars().count();
        if len > width {
            return Err(BatchError::format(
                record,
                prefix,
                format!("{len} characters do not fit width {width}"),
            ));
        }
        Ok(self.layout.zero_fill(prefix))
    }
}

impl FlatFileCallback<ReportLine> for ReportTrailer<'_> {
    fn header(&self) -> Result<Option<String>> {
        let l = self.layout;
        let prefix = format!(
            "{}{}{}{}{}",
            l.header_code,
            l.file_code,
            fit_field("file_name", &l.file_name, l.file_name_width, FieldKind::Text)?,
            l.batch_number,
            self.run_date.format(DATE_FORMAT),
        );
        self.fill_record("header", prefix).map(Some)
    }

    fn on_written(&mut self, item: &ReportLine) {
        self.count += 1;
        self.total += item.amount();
    }

    fn footer(&self) -> Result<Option<String>> {
        let l = self.layout;
        let prefix = format!(
            "{}{}{}",
            l.footer_code,
            fit_field("record_count", &self.count, l.count_width, FieldKind::Numeric)?,
            fit_field("total_amount", &self.total, l.total_width, FieldKind::Numeric)?,
        );
        self.fill_record("footer", prefix).map(Some)
    }
}

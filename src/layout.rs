//! Report layout: the single table of field order, widths and kinds.
//!
//! Detail record layout (300 characters, no delimiter):
//!
//! ```text
//! pos  width kind  field
//!   0      2 num   identificacaoRegistro (always "21")
//!   2     12 num   codigoPagamento
//!  14      8 num   exercicioFinanceiro
//!  22      4 num   anoBase
//!  26     11 num   pisPasep
//!  37     70 text  nome
//! 107      8 num   nascimento (ddMMyyyy)
//! 115     11 num   cpf
//! 126     70 text  nomeMae
//! 196      2 num   numeroParcela
//! 198      9 num   valorPagamento
//! 207      2 num   mesesTrabalhados
//! 209      8 num   dataInicialPagamento
//! 217      8 num   dataFinalPagamento
//! 225     20 num   numeroSentenca
//! 245      4 num   banco
//! 249      5 num   agencia
//! 254      1 text  digitoVerificador
//! 255      2 num   tipoConta
//! 257     15 num   conta
//! 272      1 num   indicadorPagamento
//! 273     27 num   zeros
//! ```

use crate::format::{DATE_WIDTH, FieldKind};

/// Number of fields in a detail record.
pub const FIELD_COUNT: usize = 22;

/// One column of the fixed-width layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: usize,
    pub kind: FieldKind,
}

const fn numeric(name: &'static str, width: usize) -> FieldSpec {
    FieldSpec {
        name,
        width,
        kind: FieldKind::Numeric,
    }
}

const fn text(name: &'static str, width: usize) -> FieldSpec {
    FieldSpec {
        name,
        width,
        kind: FieldKind::Text,
    }
}

/// Detail record fields, in wire order.
pub const DETAIL_FIELDS: [FieldSpec; FIELD_COUNT] = [
    numeric("identificacaoRegistro", 2),
    numeric("codigoPagamento", 12),
    numeric("exercicioFinanceiro", 8),
    numeric("anoBase", 4),
    numeric("pisPasep", 11),
    text("nome", 70),
    numeric("nascimento", DATE_WIDTH),
    numeric("cpf", 11),
    text("nomeMae", 70),
    numeric("numeroParcela", 2),
    numeric("valorPagamento", 9),
    numeric("mesesTrabalhados", 2),
    numeric("dataInicialPagamento", DATE_WIDTH),
    numeric("dataFinalPagamento", DATE_WIDTH),
    numeric("numeroSentenca", 20),
    numeric("banco", 4),
    numeric("agencia", 5),
    text("digitoVerificador", 1),
    numeric("tipoConta", 2),
    numeric("conta", 15),
    numeric("indicadorPagamento", 1),
    numeric("zeros", 27),
];

/// Immutable layout configuration, built once and shared by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    pub fields: [FieldSpec; FIELD_COUNT],
    pub header_code: String,
    pub detail_code: String,
    pub footer_code: String,
    pub file_code: String,
    pub file_name: String,
    pub file_name_width: usize,
    pub batch_number: String,
    pub count_width: usize,
    pub total_width: usize,
    pub mother_name_placeholder: String,
    pub defaults: LiteralDefaults,
}

/// Values written when a payment leaves the attribute empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralDefaults {
    pub fiscal_year: String,
    pub base_year: String,
    pub installment: String,
    pub payment_start: String,
    pub payment_end: String,
    pub judicial_order: String,
}

impl Default for LiteralDefaults {
    fn default() -> Self {
        Self {
            fiscal_year: "01012022".to_string(),
            base_year: "2022".to_string(),
            installment: "01".to_string(),
            payment_start: "05022024".to_string(),
            payment_end: "31122024".to_string(),
            judicial_order: "0".repeat(20),
        }
    }
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            fields: DETAIL_FIELDS,
            header_code: "11".to_string(),
            detail_code: "21".to_string(),
            footer_code: "31".to_string(),
            file_code: "446954311".to_string(),
            file_name: "ARQUIVOCAIXA".to_string(),
            file_name_width: 50,
            batch_number: "12345".to_string(),
            count_width: 9,
            total_width: 13,
            mother_name_placeholder: "Não Informado".to_string(),
            defaults: LiteralDefaults::default(),
        }
    }
}

impl ReportLayout {
    /// Total width of a record, in characters.
    pub fn record_length(&self) -> usize {
        self.fields.iter().map(|f| f.width).sum()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Character offset of each field.
    pub fn offsets(&self) -> [usize; FIELD_COUNT] {
        let mut offsets = [0; FIELD_COUNT];
        let mut pos = 0;
        for (slot, field) in offsets.iter_mut().zip(&self.fields) {
            *slot = pos;
            pos += field.width;
        }
        offsets
    }

    /// Right-fill `prefix` with zeros up to the record length.
    ///
    /// Header and footer records share the detail record length.
    pub fn zero_fill(&self, prefix: String) -> String {
        let len = prefix.chars().count();
        let mut out = prefix;
        out.extend(std::iter::repeat_n('0', self.record_length().saturating_sub(len)));
        out
    }

    /// Cut a detail line back into its fields.
    ///
    /// Returns `None` when the line is not exactly one record long.
    pub fn split<'a>(&self, line: &'a str) -> Option<Vec<&'a str>> {
        let mut bounds: Vec<usize> = line.char_indices().map(|(i, _)| i).collect();
        if bounds.len() != self.record_length() {
            return None;
        }
        bounds.push(line.len());

        let mut fields = Vec::with_capacity(FIELD_COUNT);
        let mut start = 0;
        for field in &self.fields {
            let end = start + field.width;
            fields.push(&line[bounds[start]..bounds[end]]);
            start = end;
        }
        Some(fields)
    }
}

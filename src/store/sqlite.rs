//! SQLite implementation of the payment repository.

use super::{PaymentRepository, Row, RunStatus, Value};
use crate::error::Result;
use crate::payment::Payment;
use chrono::Utc;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Params, Statement, params};
use std::path::Path;
use std::slice;

const SCHEMA: &str = include_str!("../../migrations/001_payments.sql");

const UPSERT_WORKER: &str = "
    INSERT INTO tb_trabalhador (pis_pasep, nome, nascimento, cpf, nome_mae)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (pis_pasep) DO UPDATE SET
        nome = excluded.nome,
        nascimento = excluded.nascimento,
        cpf = excluded.cpf,
        nome_mae = excluded.nome_mae";

const UPSERT_BANK: &str = "
    INSERT INTO tb_banco (codigo_banco, agencia, digito_verificador, tipo_conta, conta)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (codigo_banco, agencia, conta) DO UPDATE SET
        digito_verificador = excluded.digito_verificador,
        tipo_conta = excluded.tipo_conta";

const UPSERT_PAYMENT: &str = "
    INSERT INTO tb_pagamento (
        codigo_pagamento, identificacao_registro, exercicio_financeiro, ano_base,
        numero_parcela, valor_pagamento, meses_trabalhados, data_inicial_pagamento,
        data_final_pagamento, numero_sentenca, indicador_pagamento,
        fk_trabalhador_id, fk_banco_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
    ON CONFLICT (codigo_pagamento) DO UPDATE SET
        identificacao_registro = excluded.identificacao_registro,
        exercicio_financeiro = excluded.exercicio_financeiro,
        ano_base = excluded.ano_base,
        numero_parcela = excluded.numero_parcela,
        valor_pagamento = excluded.valor_pagamento,
        meses_trabalhados = excluded.meses_trabalhados,
        data_inicial_pagamento = excluded.data_inicial_pagamento,
        data_final_pagamento = excluded.data_final_pagamento,
        numero_sentenca = excluded.numero_sentenca,
        indicador_pagamento = excluded.indicador_pagamento,
        fk_trabalhador_id = excluded.fk_trabalhador_id,
        fk_banco_id = excluded.fk_banco_id";

pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_schema(conn)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_schema(conn)
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn payment_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tb_pagamento", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Raw connection, for fixtures that need rows the import cannot produce.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn upsert(conn: &Connection, p: &Payment) -> Result<()> {
    conn.execute(
        UPSERT_WORKER,
        params![
            p.pis_pasep,
            p.name,
            p.birth_date.map(|d| d.to_string()),
            p.cpf,
            p.mother_name,
        ],
    )?;
    let worker_id: i64 = conn.query_row(
        "SELECT trabalhador_id FROM tb_trabalhador WHERE pis_pasep = ?1",
        params![p.pis_pasep],
        |row| row.get(0),
    )?;

    conn.execute(
        UPSERT_BANK,
        params![p.bank, p.branch, p.check_digit, p.account_type, p.account],
    )?;
    let bank_id: i64 = conn.query_row(
        "SELECT banco_id FROM tb_banco WHERE codigo_banco = ?1 AND agencia = ?2 AND conta = ?3",
        params![p.bank, p.branch, p.account],
        |row| row.get(0),
    )?;

    conn.execute(
        UPSERT_PAYMENT,
        params![
            p.payment_code,
            p.registration_id,
            p.fiscal_year,
            p.base_year,
            p.installment,
            p.amount,
            p.months_worked,
            p.payment_start.map(|d| d.to_string()),
            p.payment_end.map(|d| d.to_string()),
            p.judicial_order,
            p.payment_indicator,
            worker_id,
            bank_id,
        ],
    )?;
    Ok(())
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl PaymentRepository for SqliteRepository {
    fn save(&mut self, payment: &Payment) -> Result<()> {
        self.save_all(slice::from_ref(payment))
    }

    fn save_all(&mut self, payments: &[Payment]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for payment in payments {
            upsert(&tx, payment)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        collect_rows(&mut self.conn.prepare(sql)?, [])
    }

    fn query_page(&self, sql: &str, limit: usize, offset: usize) -> Result<Vec<Row>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM ({sql}) LIMIT ?1 OFFSET ?2"))?;
        collect_rows(&mut stmt, params![limit as i64, offset as i64])
    }

    fn start_run(&mut self, job_name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO batch_job_run (job_name, status, started_at) VALUES (?1, 'STARTED', ?2)",
            params![job_name, Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE batch_job_run SET status = ?2, finished_at = ?3 WHERE run_id = ?1",
            params![run_id, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(rusqlite::Error::QueryReturnedNoRows.into());
        }
        Ok(())
    }
}

fn collect_rows(stmt: &mut Statement<'_>, params: impl Params) -> Result<Vec<Row>> {
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt
        .query_map(params, |r| {
            let mut row = Row::new();
            for (i, name) in names.iter().enumerate() {
                row.insert(name.clone(), to_value(r.get_ref(i)?));
            }
            Ok(row)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

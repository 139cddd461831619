// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use budget_ledger_rs::{
    Actor, ApprovalEngine, CategoryId, DepartmentId, KeyAccountId, RequestId,
};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

/// Budget Ledger - Replay approval workflow operation CSV files
///
/// Reads operations from a CSV file and outputs key account balances to
/// stdout. Supports reference-data upserts, request creation, approvals,
/// rejections, and the revision workflow.
#[derive(Parser, Debug)]
#[command(name = "budget-ledger-rs")]
#[command(about = "A budget approval engine that replays operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,actor,role,request,department,account,category,amount,text
    /// Example: cargo run -- operations.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    // Replay operations from CSV
    let engine = match process_operations(BufReader::new(file)) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    // Write balances to stdout
    if let Err(e) = write_accounts(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, actor, role, request, department, account, category, amount, text`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    actor: Option<u32>,
    #[serde(default)]
    role: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    request: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    department: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    account: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    category: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default)]
    text: String,
}

/// One workflow operation parsed from a CSV row.
#[derive(Debug)]
enum Operation {
    UpsertDepartment {
        actor: Actor,
        department: DepartmentId,
        name: String,
    },
    UpsertCategory {
        actor: Actor,
        category: CategoryId,
        name: String,
    },
    UpsertAccount {
        actor: Actor,
        account: KeyAccountId,
        name: String,
        total: Decimal,
    },
    Create {
        actor: Actor,
        department: DepartmentId,
        account: KeyAccountId,
        category: Option<CategoryId>,
        amount: Decimal,
        reason: String,
    },
    Approve {
        actor: Actor,
        request: RequestId,
    },
    Reject {
        actor: Actor,
        request: RequestId,
        reason: String,
    },
    Revise {
        actor: Actor,
        request: RequestId,
        feedback: String,
        amount: Option<Decimal>,
    },
    Resubmit {
        actor: Actor,
        request: RequestId,
        amount: Decimal,
        account: KeyAccountId,
        category: Option<CategoryId>,
        reason: String,
    },
    Version {
        actor: Actor,
        request: RequestId,
        amount: Option<Decimal>,
        feedback: String,
    },
    Resolve {
        actor: Actor,
        request: RequestId,
    },
}

impl CsvRecord {
    fn actor(&self) -> Option<Actor> {
        let user_id = self.actor?;
        match self.role.trim().to_lowercase().as_str() {
            "admin" => Some(Actor::admin(user_id)),
            "user" => Some(Actor::user(user_id)),
            _ => None,
        }
    }

    /// Converts a CSV record to an Operation.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_operation(self) -> Option<Operation> {
        let actor = self.actor()?;

        match self.op.to_lowercase().as_str() {
            "department" => Some(Operation::UpsertDepartment {
                actor,
                department: DepartmentId(self.department?),
                name: self.text,
            }),
            "category" => Some(Operation::UpsertCategory {
                actor,
                category: CategoryId(self.category?),
                name: self.text,
            }),
            "account" => Some(Operation::UpsertAccount {
                actor,
                account: KeyAccountId(self.account?),
                name: self.text,
                total: self.amount?,
            }),
            "create" => Some(Operation::Create {
                actor,
                department: DepartmentId(self.department?),
                account: KeyAccountId(self.account?),
                category: self.category.map(CategoryId),
                amount: self.amount?,
                reason: self.text,
            }),
            "approve" => Some(Operation::Approve {
                actor,
                request: RequestId(self.request?),
            }),
            "reject" => Some(Operation::Reject {
                actor,
                request: RequestId(self.request?),
                reason: self.text,
            }),
            "revise" => Some(Operation::Revise {
                actor,
                request: RequestId(self.request?),
                feedback: self.text,
                amount: self.amount,
            }),
            "resubmit" => Some(Operation::Resubmit {
                actor,
                request: RequestId(self.request?),
                amount: self.amount?,
                account: KeyAccountId(self.account?),
                category: self.category.map(CategoryId),
                reason: self.text,
            }),
            "version" => Some(Operation::Version {
                actor,
                request: RequestId(self.request?),
                amount: self.amount,
                feedback: self.text,
            }),
            "resolve" => Some(Operation::Resolve {
                actor,
                request: RequestId(self.request?),
            }),
            _ => None,
        }
    }
}

fn apply(engine: &ApprovalEngine, op: Operation) -> Result<(), budget_ledger_rs::ApprovalError> {
    match op {
        Operation::UpsertDepartment {
            actor,
            department,
            name,
        } => engine.upsert_department(actor, department, &name),
        Operation::UpsertCategory {
            actor,
            category,
            name,
        } => engine.upsert_category(actor, category, &name),
        Operation::UpsertAccount {
            actor,
            account,
            name,
            total,
        } => engine.upsert_account(actor, account, &name, "expense", total),
        Operation::Create {
            actor,
            department,
            account,
            category,
            amount,
            reason,
        } => engine
            .create_request(actor, department, account, category, amount, &reason)
            .map(|_| ()),
        Operation::Approve { actor, request } => engine.approve(actor, request),
        Operation::Reject {
            actor,
            request,
            reason,
        } => engine.reject(actor, request, &reason),
        Operation::Revise {
            actor,
            request,
            feedback,
            amount,
        } => engine.request_revision(actor, request, &feedback, amount),
        Operation::Resubmit {
            actor,
            request,
            amount,
            account,
            category,
            reason,
        } => engine.submit_revision(actor, request, amount, &reason, account, category),
        Operation::Version {
            actor,
            request,
            amount,
            feedback,
        } => engine
            .create_revision_version(
                actor,
                request,
                amount,
                if feedback.trim().is_empty() {
                    None
                } else {
                    Some(&feedback)
                },
            )
            .map(|_| ()),
        Operation::Resolve { actor, request } => engine.resolve_revision(actor, request),
    }
}

/// Replay operations from a CSV reader.
///
/// Streaming parse; malformed rows and refused operations are skipped so a
/// batch replays as far as it can. Request ids are allocated sequentially
/// in creation order, which is what lets later rows reference earlier
/// requests by number.
///
/// # CSV Format
///
/// Expected columns: `op, actor, role, request, department, account, category, amount, text`
///
/// # Example
///
/// ```csv
/// op,actor,role,request,department,account,category,amount,text
/// department,1,admin,,1,,,,Engineering
/// account,1,admin,,,1,,1000.00,IT operations
/// create,2,user,,1,1,,250.00,new monitors
/// approve,1,admin,1,,,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
/// Individual operation errors are logged and don't stop processing.
pub fn process_operations<R: Read>(reader: R) -> Result<ApprovalEngine, csv::Error> {
    let engine = ApprovalEngine::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some(op) = record.into_operation() else {
                    tracing::debug!("skipping invalid operation record");
                    continue;
                };

                if let Err(e) = apply(&engine, op) {
                    tracing::debug!("skipping refused operation: {e}");
                }
            }
            Err(e) => {
                tracing::debug!("skipping malformed row: {e}");
                continue;
            }
        }
    }

    Ok(engine)
}

/// Write key account balances to a CSV writer.
///
/// Outputs all accounts with 2 decimal precision.
///
/// # CSV Format
///
/// Columns: `account, name, total, used, available`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(engine: &ApprovalEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for account in engine.ledger().accounts() {
        wtr.serialize(&*account)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use budget_ledger_rs::RequestStatus;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    const SETUP: &str = "op,actor,role,request,department,account,category,amount,text\n\
                         department,1,admin,,1,,,,Engineering\n\
                         account,1,admin,,,1,,1000.00,IT operations\n";

    #[test]
    fn parse_create_and_approve() {
        let csv = format!(
            "{SETUP}\
             create,2,user,,1,1,,250.00,new monitors\n\
             approve,1,admin,1,,,,,\n"
        );

        let engine = process_operations(Cursor::new(csv)).unwrap();

        let budget = engine.available_budget(KeyAccountId(1)).unwrap();
        assert_eq!(budget.used, dec!(250.00));
        let request = engine.get_request(RequestId(1)).unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
    }

    #[test]
    fn parse_reject_sequence() {
        let csv = format!(
            "{SETUP}\
             create,2,user,,1,1,,250.00,new monitors\n\
             reject,1,admin,1,,,,,too expensive\n"
        );

        let engine = process_operations(Cursor::new(csv)).unwrap();

        let request = engine.get_request(RequestId(1)).unwrap();
        assert_eq!(request.status, RequestStatus::Rejected);
        assert_eq!(engine.available_budget(KeyAccountId(1)).unwrap().used, dec!(0));
    }

    #[test]
    fn parse_revision_roundtrip() {
        let csv = format!(
            "{SETUP}\
             create,2,user,,1,1,,300.00,conference travel\n\
             revise,1,admin,1,,,,150.00,reduce amount\n\
             resubmit,2,user,1,,1,,150.00,reduced travel plan\n\
             approve,1,admin,1,,,,,\n"
        );

        let engine = process_operations(Cursor::new(csv)).unwrap();

        let request = engine.get_request(RequestId(1)).unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.amount, dec!(150.00));
        assert_eq!(engine.history_for(RequestId(1)).len(), 1);
    }

    #[test]
    fn parse_version_and_resolve() {
        let csv = format!(
            "{SETUP}\
             create,2,user,,1,1,,200.00,workstation\n\
             version,1,admin,1,,,,250.00,upgraded spec\n\
             resolve,1,admin,2,,,,,\n"
        );

        let engine = process_operations(Cursor::new(csv)).unwrap();

        let parent = engine.get_request(RequestId(1)).unwrap();
        assert_eq!(parent.status, RequestStatus::Approved);
        assert_eq!(parent.amount, dec!(250.00));
        assert!(engine.get_request(RequestId(2)).is_none());
    }

    #[test]
    fn parse_with_whitespace() {
        let csv = "op,actor,role,request,department,account,category,amount,text\n\
                   department , 1 , admin , , 1 , , , , Engineering \n";

        let engine = process_operations(Cursor::new(csv)).unwrap();
        // Department landed despite padded fields; creating against it works
        // once an account exists.
        engine
            .upsert_account(Actor::admin(1), KeyAccountId(1), "ops", "expense", dec!(10))
            .unwrap();
        engine
            .create_request(
                Actor::user(2),
                DepartmentId(1),
                KeyAccountId(1),
                None,
                dec!(5),
                "cables",
            )
            .unwrap();
    }

    #[test]
    fn skip_malformed_rows() {
        let csv = format!(
            "{SETUP}\
             bogus,row,data,here,,,,,\n\
             create,2,user,,1,1,,50.00,cables\n"
        );

        let engine = process_operations(Cursor::new(csv)).unwrap();
        assert!(engine.get_request(RequestId(1)).is_some());
    }

    #[test]
    fn refused_operations_do_not_stop_replay() {
        // The approve references a request that does not exist yet; the
        // replay continues and the later create still lands.
        let csv = format!(
            "{SETUP}\
             approve,1,admin,7,,,,,\n\
             create,2,user,,1,1,,50.00,cables\n"
        );

        let engine = process_operations(Cursor::new(csv)).unwrap();
        assert_eq!(engine.pending_requests().len(), 1);
    }

    #[test]
    fn write_accounts_to_csv() {
        let csv = format!(
            "{SETUP}\
             create,2,user,,1,1,,250.00,new monitors\n\
             approve,1,admin,1,,,,,\n"
        );
        let engine = process_operations(Cursor::new(csv)).unwrap();

        let mut output = Vec::new();
        write_accounts(&engine, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.contains("account,name,total,used,available"));
        assert!(output_str.contains("250.00"));
    }
}

use crate::application::marketplace::Command;
use crate::domain::identity::{Caller, Role, UserId};
use crate::domain::order::{OrderId, OrderRequest};
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Create,
    Apply,
    Request,
    Accept,
    AcceptRequest,
    Decline,
    Cancel,
    Complete,
    Rate,
}

/// One row of a command log. Which optional columns are required depends on
/// `command`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub command: CommandKind,
    pub caller: String,
    pub role: Role,
    pub order: Option<u64>,
    pub maid: Option<String>,
    pub job_type: Option<String>,
    pub duration: Option<String>,
    pub charges: Option<Decimal>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub score: Option<i64>,
    pub comment: Option<String>,
}

fn required<T>(value: Option<T>, field: &str, kind: CommandKind) -> Result<T> {
    value.ok_or_else(|| {
        EngineError::Validation(format!("{kind:?} command requires a `{field}` column"))
    })
}

impl TryFrom<CommandRecord> for Command {
    type Error = EngineError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let kind = record.command;
        let caller = Caller::new(record.caller, record.role);
        let order_id = || required(record.order, "order", kind).map(OrderId::new);
        let maid_id = || required(record.maid.clone(), "maid", kind).map(UserId::new);

        let command = match kind {
            CommandKind::Create => Command::CreateOrder {
                caller,
                request: OrderRequest {
                    job_type: record.job_type.clone().unwrap_or_default(),
                    duration: record.duration.clone().unwrap_or_default(),
                    charges: required(record.charges, "charges", kind)?,
                    latitude: required(record.lat, "lat", kind)?,
                    longitude: required(record.lng, "lng", kind)?,
                },
            },
            CommandKind::Apply => Command::Apply {
                caller,
                order_id: order_id()?,
            },
            CommandKind::Request => Command::RequestMaid {
                caller,
                order_id: order_id()?,
                maid_id: maid_id()?,
            },
            CommandKind::Accept => Command::AcceptApplicant {
                caller,
                order_id: order_id()?,
                maid_id: maid_id()?,
            },
            CommandKind::AcceptRequest => Command::AcceptRequest {
                caller,
                order_id: order_id()?,
            },
            CommandKind::Decline => Command::Decline {
                caller,
                order_id: order_id()?,
                maid_id: maid_id()?,
            },
            CommandKind::Cancel => Command::Cancel {
                caller,
                order_id: order_id()?,
            },
            CommandKind::Complete => Command::Complete {
                caller,
                order_id: order_id()?,
            },
            CommandKind::Rate => Command::Rate {
                caller,
                order_id: order_id()?,
                score: required(record.score, "score", kind)?,
                comment: record.comment.clone().unwrap_or_default(),
            },
        };
        Ok(command)
    }
}

/// Reads commands from a CSV source.
///
/// This reader wraps `csv::Reader` and yields each command with the line it
/// starts on. It trims whitespace and accepts rows that omit trailing optional
/// columns.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

fn line_of(position: Option<&csv::Position>) -> Option<u64> {
    position.map(csv::Position::line)
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads, deserializes and converts
    /// commands, so large logs are streamed rather than loaded whole.
    ///
    /// Line numbers come from the parser, so quoted fields spanning several
    /// lines do not shift the numbering of later records. An unreadable
    /// header ends the stream after a single error.
    pub fn commands(mut self) -> impl Iterator<Item = (Option<u64>, Result<Command>)> {
        let (headers, failed) = match self.reader.headers() {
            Ok(headers) => (headers.clone(), None),
            Err(err) => (
                csv::StringRecord::new(),
                Some((line_of(err.position()), Err(EngineError::from(err)))),
            ),
        };
        let reader = self.reader;
        let records = failed.is_none().then(move || {
            reader.into_records().map(move |result| match result {
                Ok(record) => {
                    let command = record
                        .deserialize::<CommandRecord>(Some(&headers))
                        .map_err(EngineError::from)
                        .and_then(Command::try_from);
                    (line_of(record.position()), command)
                }
                Err(err) => (line_of(err.position()), Err(EngineError::from(err))),
            })
        });
        failed.into_iter().chain(records.into_iter().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "command,caller,role,order,maid,job_type,duration,charges,lat,lng,score,comment";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{HEADER}\n\
             create, o1, homeowner, , , Cleaning, 4 hours, 500, 24.86, 67.01, ,\n\
             apply, M1, maid, 1\n\
             rate, o1, homeowner, 1, , , , , , , 5, Great job"
        );
        let reader = CommandReader::new(data.as_bytes());
        let (lines, results): (Vec<_>, Vec<_>) = reader.commands().unzip();

        assert_eq!(lines, vec![Some(2), Some(3), Some(4)]);
        match results[0].as_ref().unwrap() {
            Command::CreateOrder { caller, request } => {
                assert_eq!(caller, &Caller::homeowner("o1"));
                assert_eq!(request.job_type, "Cleaning");
                assert_eq!(request.charges, dec!(500));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(
            results[1].as_ref().unwrap(),
            &Command::Apply {
                caller: Caller::maid("M1"),
                order_id: OrderId::new(1),
            }
        );
        match results[2].as_ref().unwrap() {
            Command::Rate { score, comment, .. } => {
                assert_eq!(*score, 5);
                assert_eq!(comment, "Great job");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{HEADER}\ninvalid, o1, homeowner, 1");
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<_> = reader.commands().collect();

        assert_eq!(results[0].0, Some(2));
        assert!(matches!(results[0].1, Err(EngineError::Csv(_))));
    }

    #[test]
    fn test_reader_missing_required_column() {
        let data = format!("{HEADER}\naccept, o1, homeowner, 1");
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<_> = reader.commands().collect();

        assert!(matches!(results[0].1, Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_reader_lines_follow_multiline_fields() {
        let data = format!(
            "{HEADER}\n\
             rate,o1,homeowner,1,,,,,,,5,\"Great\njob\"\n\
             apply,M1,maid,1\n\
             accept,o1,homeowner,1"
        );
        let reader = CommandReader::new(data.as_bytes());
        let (lines, results): (Vec<_>, Vec<_>) = reader.commands().unzip();

        assert_eq!(lines, vec![Some(2), Some(4), Some(5)]);
        match results[0].as_ref().unwrap() {
            Command::Rate { comment, .. } => assert_eq!(comment, "Great\njob"),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(EngineError::Validation(_))));
    }
}

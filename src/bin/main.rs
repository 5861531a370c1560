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

use box_office::{
    Booking, BookingId, BookingStatus, CustomerId, Engine, EngineConfig, EventDetails, EventId,
    MemoryLocks, MemoryStore, OrganizerId, Outbox, PaymentStatus, Store, StoreError, TicketId,
    TicketType, Transaction,
};
use clap::{Parser, ValueEnum};
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Organizer owning every event loaded from the tickets file.
const ORGANIZER: OrganizerId = OrganizerId(1);

type BatchEngine = Engine<MemoryStore, MemoryLocks, Outbox>;

/// Box Office - Replay booking commands against a ticket catalog
///
/// Loads tickets from one CSV file, applies booking commands from another and
/// writes a report to stdout. Set RUST_LOG to see what happened to each
/// command.
#[derive(Parser, Debug)]
#[command(name = "box-office")]
#[command(about = "Replays ticket booking commands and reports the outcome", long_about = None)]
struct Args {
    /// Path to CSV file with booking commands
    ///
    /// Expected format: op,customer,ticket,booking,quantity,fail
    /// Example: cargo run -- --tickets tickets.csv commands.csv > report.csv
    #[arg(value_name = "FILE")]
    commands: PathBuf,

    /// Path to CSV file with tickets (event,type,price,quantity)
    #[arg(long, value_name = "FILE")]
    tickets: PathBuf,

    /// Which report to print
    #[arg(long, value_enum, default_value_t = Report::Tickets)]
    report: Report,

    /// Longest wait for a contested ticket, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    lock_wait_ms: u64,

    /// Lifetime of a ticket lock, in seconds
    #[arg(long, default_value_t = 300)]
    lock_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    Tickets,
    Bookings,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = EngineConfig::default()
        .with_lock_wait(Duration::from_millis(args.lock_wait_ms))
        .with_lock_ttl(Duration::from_secs(args.lock_ttl_secs));
    let engine = Engine::with_parts(MemoryStore::new(), MemoryLocks::new(), Outbox::new(), config);

    let tickets = open(&args.tickets);
    if let Err(e) = load_tickets(&engine, BufReader::new(tickets)) {
        error!(error = %e, "failed to load tickets");
        process::exit(1);
    }

    let commands = open(&args.commands);
    if let Err(e) = process_commands(&engine, BufReader::new(commands)) {
        error!(error = %e, "failed to process commands");
        process::exit(1);
    }
    info!(notifications = engine.notifier().len(), "confirmations queued");

    let written = match args.report {
        Report::Tickets => write_tickets(&engine, std::io::stdout()),
        Report::Bookings => write_bookings(&engine, std::io::stdout()),
    };
    if let Err(e) = written {
        error!(error = %e, "failed to write report");
        process::exit(1);
    }
}

fn open(path: &Path) -> File {
    match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!(path = %path.display(), error = %e, "cannot open file");
            process::exit(1);
        }
    }
}

/// Raw ticket row. Fields: `event, type, price, quantity`
#[derive(Debug, Deserialize)]
struct TicketRecord {
    event: String,
    #[serde(rename = "type")]
    ticket_type: TicketType,
    price: Decimal,
    quantity: u32,
}

/// Creates one event per distinct `event` label and the tickets under it.
///
/// Tickets get ids in file order, starting at 1. Malformed rows are skipped.
pub fn load_tickets<R: Read>(engine: &BatchEngine, reader: R) -> Result<(), csv::Error> {
    let mut events: HashMap<String, EventId> = HashMap::new();
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<TicketRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "skipping malformed ticket row");
                continue;
            }
        };

        let event_id = match events.get(&record.event) {
            Some(id) => *id,
            None => match engine.create_event(ORGANIZER, EventDetails::new(record.event.as_str(), ""))
            {
                Ok(event) => {
                    events.insert(record.event.clone(), event.id);
                    event.id
                }
                Err(e) => {
                    debug!(error = %e, "skipping ticket row");
                    continue;
                }
            },
        };

        if let Err(e) = engine.create_ticket(
            ORGANIZER,
            event_id,
            record.ticket_type,
            record.price,
            record.quantity,
        ) {
            debug!(error = %e, "skipping ticket row");
        }
    }

    Ok(())
}

/// Raw command row. Fields: `op, customer, ticket, booking, quantity, fail`
#[derive(Debug, Deserialize)]
struct CommandRecord {
    op: String,
    customer: u64,
    #[serde(deserialize_with = "csv::invalid_option")]
    ticket: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    booking: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    quantity: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fail: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Book {
        customer: CustomerId,
        ticket: TicketId,
        quantity: u32,
    },
    Cancel {
        customer: CustomerId,
        booking: BookingId,
    },
    Pay {
        booking: BookingId,
        fail: bool,
    },
}

impl CommandRecord {
    /// Returns `None` for unknown ops or missing required fields.
    fn into_command(self) -> Option<Command> {
        let customer = CustomerId(self.customer);
        match self.op.to_lowercase().as_str() {
            "book" => Some(Command::Book {
                customer,
                ticket: TicketId(self.ticket?),
                quantity: self.quantity?,
            }),
            "cancel" => Some(Command::Cancel {
                customer,
                booking: BookingId(self.booking?),
            }),
            "pay" => Some(Command::Pay {
                booking: BookingId(self.booking?),
                fail: self.fail.unwrap_or(false),
            }),
            _ => None,
        }
    }
}

/// Applies commands in file order.
///
/// Bookings get ids in the order they succeed, starting at 1. Malformed rows
/// and rejected commands are logged and skipped.
///
/// # Example
///
/// ```csv
/// op,customer,ticket,booking,quantity,fail
/// book,1,1,,2,
/// pay,1,,1,,
/// cancel,2,,2,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_commands<R: Read>(engine: &BatchEngine, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CommandRecord>() {
        let Some(command) = result.ok().and_then(CommandRecord::into_command) else {
            debug!("skipping malformed command row");
            continue;
        };

        let outcome = match command {
            Command::Book {
                customer,
                ticket,
                quantity,
            } => engine.create_booking(ticket, customer, quantity).map(drop),
            Command::Cancel { customer, booking } => {
                engine.cancel_booking(booking, customer).map(drop)
            }
            Command::Pay { booking, fail } => engine.settle(booking, fail).map(drop),
        };
        if let Err(e) = outcome {
            debug!(?command, error = %e, "command rejected");
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct TicketRow {
    ticket: TicketId,
    event: EventId,
    #[serde(rename = "type")]
    ticket_type: TicketType,
    price: Decimal,
    available: u32,
    reserved: u64,
}

/// Writes one row per ticket, ordered by id.
///
/// Columns: `ticket, event, type, price, available, reserved`
pub fn write_tickets<W: Write>(engine: &BatchEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for id in (1..).map(TicketId) {
        let Ok(ticket) = engine.ticket(id) else {
            break;
        };
        let reserved = engine
            .inventory(id)
            .map(|audit| audit.reserved)
            .unwrap_or_default();
        wtr.serialize(TicketRow {
            ticket: ticket.id,
            event: ticket.event_id,
            ticket_type: ticket.ticket_type,
            price: ticket.price,
            available: ticket.available,
            reserved,
        })?;
    }

    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct BookingRow {
    booking: BookingId,
    customer: CustomerId,
    ticket: TicketId,
    quantity: u32,
    status: BookingStatus,
    payment_status: Option<PaymentStatus>,
    amount: Option<Decimal>,
}

/// Writes one row per booking with its payment, ordered by booking id.
///
/// Columns: `booking, customer, ticket, quantity, status, payment_status, amount`
pub fn write_bookings<W: Write>(engine: &BatchEngine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let rows = engine
        .store()
        .read(|tx| {
            let bookings = tx.bookings_where(&|_: &Booking| true)?;
            bookings
                .into_iter()
                .map(|booking| -> Result<BookingRow, StoreError> {
                    let payment = tx.payment_for_booking(booking.id)?;
                    Ok(BookingRow {
                        booking: booking.id,
                        customer: booking.customer_id,
                        ticket: booking.ticket_id,
                        quantity: booking.quantity,
                        status: booking.status,
                        payment_status: payment.as_ref().map(|p| p.status),
                        amount: payment.map(|p| p.amount),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to read bookings");
            Vec::new()
        });

    for row in rows {
        wtr.serialize(row)?;
    }

    wtr.flush()?;
    Ok(())
}

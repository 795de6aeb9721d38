use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{
    CommissionFilter, CommissionService, NewCommission, NewPayout, NewProvider,
};
use crate::config::{DEFAULT_DATABASE_PATH, ServerConfig};
use crate::domain::{
    CommissionCategory, CommissionSummary, CommissionTransaction, PaymentDetails, PayoutRequest,
    Provider, ProviderKind, TransactionStatus, VerificationStatus, format_cents, format_lkr,
    parse_cents,
};

/// Commission Ledger - pharmacy and laboratory commission tracking
#[derive(Parser)]
#[command(name = "commission-ledger")]
#[command(about = "Track marketplace commissions, revenue shares and provider payouts")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "DATABASE_PATH", default_value = DEFAULT_DATABASE_PATH)]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Pharmacy and laboratory management
    #[command(subcommand)]
    Provider(ProviderCommands),

    /// Record and inspect commission transactions
    #[command(subcommand)]
    Commission(CommissionCommands),

    /// Payout requests and their processing
    #[command(subcommand)]
    Payout(PayoutCommands),

    /// Show dashboards
    #[command(subcommand)]
    Dashboard(DashboardCommands),

    /// Export data to CSV
    #[command(subcommand)]
    Export(ExportCommands),

    /// Run the JSON REST API
    Serve {
        #[command(flatten)]
        server: ServerConfig,
    },
}

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// Register a pharmacy or laboratory
    Register {
        /// Provider name
        name: String,

        /// Provider kind: pharmacy, laboratory
        #[arg(short, long)]
        kind: String,

        /// Business registration number
        #[arg(long)]
        registration_number: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },

    /// List providers
    List {
        /// Filter by kind: pharmacy, laboratory
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Show provider details and balance
    Show {
        /// Provider ID
        id: String,
    },

    /// Set verification status
    Verify {
        /// Provider ID
        id: String,

        /// Status: verified, rejected, pending
        #[arg(long, default_value = "verified")]
        status: String,
    },
}

#[derive(Subcommand)]
pub enum CommissionCommands {
    /// Record the fee for a prescription uploaded to a pharmacy
    Prescription {
        /// Pharmacy ID
        #[arg(long)]
        pharmacy: String,

        /// Prescription reference
        #[arg(long)]
        prescription: String,

        /// Transaction date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record the fee for a laboratory booking
    LabBooking {
        /// Laboratory ID
        #[arg(long)]
        laboratory: String,

        /// Booking reference
        #[arg(long)]
        booking: String,

        /// Transaction date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record an arbitrary commission
    Record {
        /// Amount (e.g., "100.00" or "100")
        amount: String,

        /// Provider ID
        #[arg(long)]
        provider: String,

        /// Description of the commission
        #[arg(short, long)]
        description: String,

        /// Category: prescription, lab_booking, other (derived from the description if omitted)
        #[arg(short, long)]
        category: Option<String>,

        /// Status: pending, processing, completed, failed
        #[arg(long)]
        status: Option<String>,

        /// Transaction date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List commission transactions
    List {
        /// Filter by pharmacy ID
        #[arg(long)]
        pharmacy: Option<String>,

        /// Filter by laboratory ID
        #[arg(long)]
        laboratory: Option<String>,

        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show a commission transaction
    Show {
        /// Commission ID
        id: String,
    },

    /// Change the status of a commission
    Status {
        /// Commission ID
        id: String,

        /// New status: processing, completed, failed
        status: String,
    },

    /// Show the commission summary
    Summary {
        /// Limit to one provider
        #[arg(long)]
        provider: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum PayoutCommands {
    /// Request a payout of available commission
    Request {
        /// Amount (e.g., "100.00" or "100")
        amount: String,

        /// Provider ID
        #[arg(long)]
        provider: String,

        /// Bank name (bank transfer)
        #[arg(long, conflicts_with = "qr")]
        bank_name: Option<String>,

        /// Account holder name (bank transfer)
        #[arg(long)]
        account_name: Option<String>,

        /// Account number (bank transfer)
        #[arg(long)]
        account_number: Option<String>,

        /// Branch (bank transfer)
        #[arg(long)]
        branch: Option<String>,

        /// QR payment reference
        #[arg(long)]
        qr: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List payout requests, newest first
    List {
        /// Filter by provider ID
        #[arg(long)]
        provider: Option<String>,

        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show a payout request
    Show {
        /// Payout ID
        id: String,
    },

    /// Start processing a pending payout
    Process {
        /// Payout ID
        id: String,
    },

    /// Mark a payout as paid
    Complete {
        /// Payout ID
        id: String,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Reject a pending payout
    Fail {
        /// Payout ID
        id: String,

        /// Reason for the rejection
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum DashboardCommands {
    /// Platform-wide dashboard
    Admin {
        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Dashboard of a single provider
    Provider {
        /// Provider ID
        id: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export commission transactions
    Transactions {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Filter by pharmacy ID
        #[arg(long)]
        pharmacy: Option<String>,

        /// Filter by laboratory ID
        #[arg(long)]
        laboratory: Option<String>,
    },

    /// Export payout requests
    Payouts {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Filter by provider ID
        #[arg(long)]
        provider: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let level = match (&self.command, self.verbose) {
            (_, true) => "debug",
            (Commands::Serve { .. }, false) => "info",
            _ => "warn",
        };
        crate::logging::init(level);

        match self.command {
            Commands::Init => {
                CommissionService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Provider(cmd) => {
                let service = CommissionService::connect(&self.database).await?;
                run_provider_command(&service, cmd).await?;
            }

            Commands::Commission(cmd) => {
                let service = CommissionService::connect(&self.database).await?;
                run_commission_command(&service, cmd).await?;
            }

            Commands::Payout(cmd) => {
                let service = CommissionService::connect(&self.database).await?;
                run_payout_command(&service, cmd).await?;
            }

            Commands::Dashboard(cmd) => {
                let service = CommissionService::connect(&self.database).await?;
                run_dashboard_command(&service, cmd).await?;
            }

            Commands::Export(cmd) => {
                let service = CommissionService::connect(&self.database).await?;
                run_export_command(&service, cmd).await?;
            }

            Commands::Serve { server } => {
                let service = CommissionService::init(&self.database).await?;
                crate::api::serve(service, &server).await?;
            }
        }

        Ok(())
    }
}

async fn run_provider_command(service: &CommissionService, cmd: ProviderCommands) -> Result<()> {
    match cmd {
        ProviderCommands::Register {
            name,
            kind,
            registration_number,
            address,
            phone,
            email,
        } => {
            let provider = service
                .register_provider(NewProvider {
                    kind: parse_kind(&kind)?,
                    name,
                    registration_number,
                    address,
                    phone,
                    email,
                })
                .await?;
            println!(
                "Registered {}: {} ({})",
                provider.kind, provider.name, provider.id
            );
        }

        ProviderCommands::List { kind } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let providers = service.list_providers(kind).await?;
            if providers.is_empty() {
                println!("No providers found.");
            } else {
                println!(
                    "{:<36}  {:<10} {:<25} {:<9}",
                    "ID", "KIND", "NAME", "STATUS"
                );
                println!("{}", "-".repeat(84));
                for provider in providers {
                    println!(
                        "{:<36}  {:<10} {:<25} {:<9}",
                        provider.id,
                        provider.kind,
                        truncate(&provider.name, 25),
                        provider.verification
                    );
                }
            }
        }

        ProviderCommands::Show { id } => {
            let provider = service.get_provider(parse_id(&id, "provider")?).await?;
            let balance = service.provider_balance(provider.id).await?;
            print_provider(&provider);
            println!();
            println!("  Earned:         {:>12}", format_cents(balance.earned));
            println!("  Reserved:       {:>12}", format_cents(balance.reserved));
            println!("  Paid out:       {:>12}", format_cents(balance.paid_out));
            println!("  Available:      {:>12}", format_cents(balance.available));
        }

        ProviderCommands::Verify { id, status } => {
            let status = VerificationStatus::from_str(&status)
                .ok_or_else(|| anyhow!("Invalid verification status '{}'", status))?;
            let provider = service
                .set_verification(parse_id(&id, "provider")?, status)
                .await?;
            println!("{} is now {}", provider.name, provider.verification);
        }
    }
    Ok(())
}

async fn run_commission_command(
    service: &CommissionService,
    cmd: CommissionCommands,
) -> Result<()> {
    match cmd {
        CommissionCommands::Prescription {
            pharmacy,
            prescription,
            date,
        } => {
            let commission = service
                .record_prescription_commission(
                    parse_id(&pharmacy, "pharmacy")?,
                    &prescription,
                    parse_optional_date(date)?,
                )
                .await?;
            print_recorded(&commission);
        }

        CommissionCommands::LabBooking {
            laboratory,
            booking,
            date,
        } => {
            let commission = service
                .record_lab_booking_commission(
                    parse_id(&laboratory, "laboratory")?,
                    &booking,
                    parse_optional_date(date)?,
                )
                .await?;
            print_recorded(&commission);
        }

        CommissionCommands::Record {
            amount,
            provider,
            description,
            category,
            status,
            date,
        } => {
            let category = category
                .map(|c| {
                    CommissionCategory::from_str(&c)
                        .ok_or_else(|| anyhow!("Invalid category '{}'", c))
                })
                .transpose()?;
            let commission = service
                .record_commission(NewCommission {
                    provider_id: parse_id(&provider, "provider")?,
                    amount_cents: parse_amount(&amount)?,
                    description,
                    category,
                    status: status.as_deref().map(parse_status).transpose()?,
                    transaction_date: Some(parse_optional_date(date)?),
                })
                .await?;
            print_recorded(&commission);
        }

        CommissionCommands::List {
            pharmacy,
            laboratory,
            status,
        } => {
            let filter = CommissionFilter {
                pharmacy_id: pharmacy.map(|id| parse_id(&id, "pharmacy")).transpose()?,
                laboratory_id: laboratory
                    .map(|id| parse_id(&id, "laboratory"))
                    .transpose()?,
                status: status.as_deref().map(parse_status).transpose()?,
            };
            let transactions = service.list_commissions(filter).await?;
            print_transactions(&transactions);
        }

        CommissionCommands::Show { id } => {
            let tx = service.get_commission(parse_id(&id, "commission")?).await?;
            println!("Commission {}", tx.id);
            println!("  Date:        {}", tx.transaction_date.format("%Y-%m-%d %H:%M:%S"));
            println!("  Provider:    {} {}", tx.provider.kind, tx.provider.id);
            println!("  Amount:      {}", format_lkr(tx.amount_cents));
            println!("  Category:    {}", tx.category);
            println!("  Status:      {}", tx.status);
            println!("  Description: {}", tx.description);
            if let Some(prescription) = &tx.prescription_id {
                println!("  Prescription: {}", prescription);
            }
            if let Some(booking) = &tx.lab_booking_id {
                println!("  Lab booking: {}", booking);
            }
        }

        CommissionCommands::Status { id, status } => {
            let tx = service
                .update_commission_status(parse_id(&id, "commission")?, parse_status(&status)?)
                .await?;
            println!("Commission {} is now {}", tx.id, tx.status);
        }

        CommissionCommands::Summary { provider, format } => {
            let provider_id = provider.map(|id| parse_id(&id, "provider")).transpose()?;
            let summary = service.summarize(provider_id, Utc::now()).await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
                _ => print_summary(&summary),
            }
        }
    }
    Ok(())
}

async fn run_payout_command(service: &CommissionService, cmd: PayoutCommands) -> Result<()> {
    match cmd {
        PayoutCommands::Request {
            amount,
            provider,
            bank_name,
            account_name,
            account_number,
            branch,
            qr,
            notes,
        } => {
            let payment_details = match qr {
                Some(qr_reference) => PaymentDetails::Qr { qr_reference },
                None => PaymentDetails::Bank {
                    bank_name: bank_name.unwrap_or_default(),
                    account_name: account_name.unwrap_or_default(),
                    account_number: account_number.unwrap_or_default(),
                    branch,
                },
            };
            let payout = service
                .request_payout(NewPayout {
                    provider_id: parse_id(&provider, "provider")?,
                    amount_cents: parse_amount(&amount)?,
                    payment_details,
                    notes,
                })
                .await?;
            println!(
                "Payout requested: {} via {} ({})",
                format_cents(payout.requested_amount),
                payout.payment_method,
                payout.id
            );
        }

        PayoutCommands::List { provider, status } => {
            let provider_id = provider.map(|id| parse_id(&id, "provider")).transpose()?;
            let status = status.as_deref().map(parse_status).transpose()?;
            let payouts = service.list_payouts(provider_id, status).await?;
            print_payouts(&payouts);
        }

        PayoutCommands::Show { id } => {
            let payout = service.get_payout(parse_id(&id, "payout")?).await?;
            print_payout(&payout);
        }

        PayoutCommands::Process { id } => {
            let payout = service.start_processing(parse_id(&id, "payout")?).await?;
            println!("Payout {} is now {}", payout.id, payout.status);
        }

        PayoutCommands::Complete { id, notes } => {
            let payout = service
                .complete_payout(parse_id(&id, "payout")?, notes)
                .await?;
            println!(
                "Payout {} completed: {}",
                payout.id,
                format_cents(payout.requested_amount)
            );
        }

        PayoutCommands::Fail { id, reason } => {
            let payout = service.fail_payout(parse_id(&id, "payout")?, reason).await?;
            println!("Payout {} failed", payout.id);
        }
    }
    Ok(())
}

async fn run_dashboard_command(service: &CommissionService, cmd: DashboardCommands) -> Result<()> {
    match cmd {
        DashboardCommands::Admin { format } => {
            let dashboard = service.admin_dashboard(Utc::now()).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
                return Ok(());
            }

            println!("Admin Dashboard ({})", dashboard.as_of.format("%Y-%m-%d"));
            println!();
            print_summary(&dashboard.summary);
            println!();
            println!("Pharmacies:       {}", dashboard.pharmacy_count);
            println!("Laboratories:     {}", dashboard.laboratory_count);
            println!(
                "Pending payouts:  {} ({})",
                dashboard.pending_payout_count,
                format_lkr(dashboard.pending_payout_amount)
            );
            println!("Total paid out:   {}", format_lkr(dashboard.total_paid_out));

            if !dashboard.providers.is_empty() {
                println!();
                println!(
                    "{:<25} {:<10} {:>6} {:>12} {:>12}",
                    "PROVIDER", "KIND", "TXS", "GROSS", "AVAILABLE"
                );
                println!("{}", "-".repeat(69));
                for row in &dashboard.providers {
                    println!(
                        "{:<25} {:<10} {:>6} {:>12} {:>12}",
                        truncate(&row.name, 25),
                        row.kind,
                        row.transaction_count,
                        format_cents(row.gross),
                        format_cents(row.balance.available)
                    );
                }
            }
        }

        DashboardCommands::Provider { id, format } => {
            let dashboard = service
                .provider_dashboard(parse_id(&id, "provider")?, Utc::now())
                .await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
                return Ok(());
            }

            print_provider(&dashboard.provider);
            println!();
            print_summary(&dashboard.summary);
            println!();
            println!("Earned:     {:>12}", format_cents(dashboard.balance.earned));
            println!("Reserved:   {:>12}", format_cents(dashboard.balance.reserved));
            println!("Paid out:   {:>12}", format_cents(dashboard.balance.paid_out));
            println!("Available:  {:>12}", format_cents(dashboard.balance.available));
            println!();
            println!("Recent transactions:");
            print_transactions(&dashboard.recent_transactions);
            println!();
            println!("Payout requests:");
            print_payouts(&dashboard.payouts);
        }
    }
    Ok(())
}

async fn run_export_command(service: &CommissionService, cmd: ExportCommands) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let open = |output: Option<&str>| -> Result<Box<dyn Write>> {
        let writer: Box<dyn Write> = match output {
            Some(path) => Box::new(
                File::create(path)
                    .with_context(|| format!("Failed to create output file: {}", path))?,
            ),
            None => Box::new(stdout()),
        };
        Ok(writer)
    };

    match cmd {
        ExportCommands::Transactions {
            output,
            pharmacy,
            laboratory,
        } => {
            let filter = CommissionFilter {
                pharmacy_id: pharmacy.map(|id| parse_id(&id, "pharmacy")).transpose()?,
                laboratory_id: laboratory
                    .map(|id| parse_id(&id, "laboratory"))
                    .transpose()?,
                status: None,
            };
            let count = exporter
                .export_commissions_csv(open(output.as_deref())?, filter)
                .await?;
            if output.is_some() {
                eprintln!("Exported {} commission transactions", count);
            }
        }

        ExportCommands::Payouts { output, provider } => {
            let provider_id = provider.map(|id| parse_id(&id, "provider")).transpose()?;
            let count = exporter
                .export_payouts_csv(open(output.as_deref())?, provider_id, None)
                .await?;
            if output.is_some() {
                eprintln!("Exported {} payout requests", count);
            }
        }
    }
    Ok(())
}

fn print_provider(provider: &Provider) {
    println!("{} ({})", provider.name, provider.kind);
    println!("  ID:             {}", provider.id);
    println!("  Verification:   {}", provider.verification);
    if let Some(registration) = &provider.registration_number {
        println!("  Registration:   {}", registration);
    }
    if let Some(address) = &provider.address {
        println!("  Address:        {}", address);
    }
    if let Some(phone) = &provider.phone {
        println!("  Phone:          {}", phone);
    }
    if let Some(email) = &provider.email {
        println!("  Email:          {}", email);
    }
    println!(
        "  Registered:     {}",
        provider.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_recorded(tx: &CommissionTransaction) {
    println!(
        "Recorded {} commission: {} for {} {} ({})",
        tx.category,
        format_cents(tx.amount_cents),
        tx.provider.kind,
        tx.provider.id,
        tx.id
    );
}

fn print_summary(summary: &CommissionSummary) {
    println!("Gross commission:   {:>14}", format_lkr(summary.gross));
    println!("Host share (70%):   {:>14}", format_lkr(summary.host_share));
    println!("Developer (30%):    {:>14}", format_lkr(summary.developer_share));
    println!(
        "Transactions:       {:>14}  ({} prescriptions, {} lab bookings)",
        summary.transaction_count, summary.prescription_count, summary.lab_booking_count
    );
    println!();
    println!("{:<8} {:>12} {:>6} {:>6} {:>6}", "MONTH", "TOTAL", "TXS", "RX", "LAB");
    println!("{}", "-".repeat(42));
    for bucket in &summary.monthly {
        println!(
            "{:<8} {:>12} {:>6} {:>6} {:>6}",
            bucket.label,
            format_cents(bucket.total),
            bucket.transaction_count,
            bucket.prescription_count,
            bucket.lab_booking_count
        );
    }
}

fn print_transactions(transactions: &[CommissionTransaction]) {
    if transactions.is_empty() {
        println!("No commission transactions found.");
        return;
    }

    println!(
        "{:<12} {:>10} {:<12} {:<11} DESCRIPTION",
        "DATE", "AMOUNT", "CATEGORY", "STATUS"
    );
    println!("{}", "-".repeat(75));
    for tx in transactions {
        println!(
            "{:<12} {:>10} {:<12} {:<11} {}",
            tx.transaction_date.format("%Y-%m-%d"),
            format_cents(tx.amount_cents),
            tx.category,
            tx.status,
            truncate(&tx.description, 30)
        );
    }
}

fn print_payouts(payouts: &[PayoutRequest]) {
    if payouts.is_empty() {
        println!("No payout requests found.");
        return;
    }

    println!(
        "{:<36}  {:<12} {:>10} {:<14} {:<11}",
        "ID", "REQUESTED", "AMOUNT", "METHOD", "STATUS"
    );
    println!("{}", "-".repeat(86));
    for payout in payouts {
        println!(
            "{:<36}  {:<12} {:>10} {:<14} {:<11}",
            payout.id,
            payout.requested_at.format("%Y-%m-%d"),
            format_cents(payout.requested_amount),
            payout.payment_method,
            payout.status
        );
    }
}

fn print_payout(payout: &PayoutRequest) {
    println!("Payout {}", payout.id);
    println!("  Provider:   {} {}", payout.provider.kind, payout.provider.id);
    println!("  Amount:     {}", format_lkr(payout.requested_amount));
    println!("  Status:     {}", payout.status);
    println!(
        "  Requested:  {}",
        payout.requested_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(processed) = payout.processed_at {
        println!("  Processed:  {}", processed.format("%Y-%m-%d %H:%M:%S"));
    }
    match &payout.payment_details {
        PaymentDetails::Bank {
            bank_name,
            account_name,
            account_number,
            branch,
        } => {
            println!("  Bank:       {}", bank_name);
            println!("  Account:    {} ({})", account_number, account_name);
            if let Some(branch) = branch {
                println!("  Branch:     {}", branch);
            }
        }
        PaymentDetails::Qr { qr_reference } => {
            println!("  QR:         {}", qr_reference);
        }
    }
    if let Some(notes) = &payout.notes {
        println!("  Notes:      {}", notes);
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

fn parse_id(id: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid {} ID format (expected UUID)", what))
}

fn parse_amount(amount: &str) -> Result<i64> {
    parse_cents(amount).context("Invalid amount format. Use '100.00' or '100'")
}

fn parse_kind(kind: &str) -> Result<ProviderKind> {
    ProviderKind::from_str(kind)
        .ok_or_else(|| anyhow!("Invalid provider kind '{}'. Use pharmacy or laboratory", kind))
}

fn parse_status(status: &str) -> Result<TransactionStatus> {
    TransactionStatus::from_str(status).ok_or_else(|| {
        anyhow!(
            "Invalid status '{}'. Use pending, processing, completed or failed",
            status
        )
    })
}

fn parse_optional_date(date: Option<String>) -> Result<DateTime<Utc>> {
    match date {
        Some(date_str) => parse_date(&date_str)
            .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)),
        None => Ok(Utc::now()),
    }
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    use chrono::NaiveDate;

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;

    // Midday keeps the calendar day stable across timezones
    let naive_datetime = naive_date
        .and_hms_opt(12, 0, 0)
        .ok_or_else(|| anyhow!("Invalid time"))?;

    Ok(naive_datetime.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-03-15").unwrap();
        assert_eq!(date.format("%Y-%m-%d").to_string(), "2024-03-15");
        assert!(parse_date("15/03/2024").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Prescription upload commission", 15), "Prescription...");
    }

    #[test]
    fn test_cli_parses_payout_request() {
        let cli = Cli::try_parse_from([
            "commission-ledger",
            "--database",
            "test.db",
            "payout",
            "request",
            "150.00",
            "--provider",
            "7f1d2c5e-0000-4000-8000-000000000001",
            "--qr",
            "LANKAQR-1",
        ])
        .unwrap();

        assert_eq!(cli.database, "test.db");
        match cli.command {
            Commands::Payout(PayoutCommands::Request { amount, qr, .. }) => {
                assert_eq!(parse_amount(&amount).unwrap(), 15_000);
                assert_eq!(qr.as_deref(), Some("LANKAQR-1"));
            }
            _ => panic!("expected payout request"),
        }
    }

    #[test]
    fn test_cli_serve_defaults() {
        let cli = Cli::try_parse_from(["commission-ledger", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { server } => {
                assert_eq!(server.port, 3000);
                assert_eq!(server.request_timeout_secs, 30);
            }
            _ => panic!("expected serve"),
        }
    }
}

//! Nomina CLI
//!
//! Command-line interface for Nomina operations:
//! - Sign in and out
//! - Manage employees, departments, hours and payroll
//! - Print the dashboard
//! - Export payroll as CSV

use anyhow::{bail, Context};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use nomina::auth::{AuthState, Credential};
use nomina::domain::{
    Department, Employee, EmployeeStatus, HourEntry, PayrollEntry, DEPARTMENTS_TABLE,
    EMPLOYEES_TABLE, HOURS_TABLE, PAYROLL_TABLE,
};
use nomina::view::{MemorySink, TableRow};
use nomina::{App, Config};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "nomina")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Employees, timesheets and payroll from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Show info-level logs
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in
    Login {
        email: String,
        #[arg(short, long)]
        password: String,
    },

    /// Sign out and clear the cached session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Manage employees
    Employees {
        #[command(subcommand)]
        action: EmployeeAction,
    },

    /// Manage departments
    Departments {
        #[command(subcommand)]
        action: DepartmentAction,
    },

    /// Timesheets
    Hours {
        #[command(subcommand)]
        action: HourAction,
    },

    /// Payroll
    Payroll {
        #[command(subcommand)]
        action: PayrollAction,
    },

    /// Monthly summary
    Dashboard,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum EmployeeAction {
    List,
    Add {
        cedula: String,
        first_name: String,
        last_name: String,
        /// Hire date, YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date)]
        hired: Option<NaiveDate>,
        #[arg(short, long, default_value = "")]
        department: String,
        #[arg(short, long, default_value = "")]
        position: String,
        #[arg(short, long, default_value = "")]
        email: String,
        #[arg(short, long, default_value_t = 0.0)]
        salary: f64,
        /// active, inactive or suspended
        #[arg(long, default_value = "active")]
        status: EmployeeStatus,
    },
    /// Remove by cedula
    Remove { cedula: String },
}

#[derive(Subcommand)]
pub enum DepartmentAction {
    List,
    Add {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long)]
        manager: Option<String>,
    },
    /// Remove by name
    Remove { name: String },
}

#[derive(Subcommand)]
pub enum HourAction {
    List,
    Add {
        /// Employee cedula
        cedula: String,
        /// Entry time, HH:MM
        entry: String,
        /// Exit time, HH:MM (earlier than entry means the next day)
        exit: String,
        /// Date, YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(short, long, default_value = "")]
        notes: String,
    },
}

#[derive(Subcommand)]
pub enum PayrollAction {
    List,
    Add {
        /// Employee cedula
        cedula: String,
        base_salary: f64,
        /// Month 1-12 (default: current)
        #[arg(long)]
        month: Option<u32>,
        /// Year (default: current)
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value_t = 0.0)]
        overtime: f64,
        #[arg(long, default_value_t = 0.0)]
        bonuses: f64,
        #[arg(long, default_value_t = 0.0)]
        deductions: f64,
    },
    /// Write payroll as CSV
    Export {
        /// Only this month (1-12); needs --year
        #[arg(long, requires = "year")]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a YYYY-MM-DD date", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let config = nomina::config::generate_default_config();
        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, &config)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", config),
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if !cli.verbose {
        config.logging.level = "warn".to_string();
    }
    nomina::app::init_logging(&config.logging);

    let sink = Arc::new(MemorySink::new());
    let app = App::build(config, sink.clone())?;
    let state = app.reconciler.check_auth_status().await;
    let today = Local::now().date_naive();
    let json = cli.format == "json";

    match cli.command {
        Commands::Login { email, password } => {
            let session = app
                .reconciler
                .login(&Credential::new(email, password))
                .await?;
            println!("Signed in as {} ({})", session.display_name, session.role);
        }

        Commands::Logout => {
            app.reconciler.logout().await?;
            println!("Signed out");
        }

        Commands::Whoami => match app.reconciler.current_user() {
            Some(user) if json => println!("{}", serde_json::to_string_pretty(&user)?),
            Some(user) => {
                println!("{} <{}>", user.display_name, user.email);
                println!("Role: {}", user.role);
                println!("Id: {}", user.id);
                println!("Signed in: {}", user.signed_in_at.format("%Y-%m-%d %H:%M"));
            }
            None if state == AuthState::Error => bail!("Session storage is unreadable"),
            None => println!("Not signed in"),
        },

        Commands::Employees { action } => {
            let employees = &app.managers.employees;
            employees.load_data().await?;

            match action {
                EmployeeAction::List => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&employees.employees())?);
                    } else {
                        employees.render(&*sink);
                        print_rows(
                            &["Cedula", "Name", "Department", "Position", "Salary", "Status"],
                            &sink.rows(EMPLOYEES_TABLE),
                        );
                    }
                }
                EmployeeAction::Add {
                    cedula,
                    first_name,
                    last_name,
                    hired,
                    department,
                    position,
                    email,
                    salary,
                    status,
                } => {
                    let employee = employees
                        .add(
                            Employee::new(cedula, first_name, last_name, hired.unwrap_or(today))
                                .department(department)
                                .position(position)
                                .email(email)
                                .salary(salary)
                                .status(status),
                        )
                        .await?;
                    println!("Added {} ({})", employee.full_name(), employee.cedula);
                }
                EmployeeAction::Remove { cedula } => {
                    let employee = employees
                        .find_by_cedula(&cedula)
                        .with_context(|| format!("No employee with cedula {}", cedula))?;
                    employees.remove(&employee.id).await?;
                    println!("Removed {}", employee.full_name());
                }
            }
        }

        Commands::Departments { action } => {
            let departments = &app.managers.departments;
            departments.load_data().await?;
            app.managers.employees.load_data().await?;

            match action {
                DepartmentAction::List => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&departments.departments())?);
                    } else {
                        departments.render(&*sink);
                        print_rows(
                            &["Name", "Description", "Manager", "Employees"],
                            &sink.rows(DEPARTMENTS_TABLE),
                        );
                    }
                }
                DepartmentAction::Add {
                    name,
                    description,
                    manager,
                } => {
                    let mut department = Department::new(name).description(description);
                    if let Some(manager) = manager {
                        department = department.manager(manager);
                    }
                    let department = departments.add(department).await?;
                    println!("Added department {}", department.name);
                }
                DepartmentAction::Remove { name } => {
                    let department = departments
                        .find_by_name(&name)
                        .with_context(|| format!("No department named {}", name))?;
                    departments.remove(&department.id).await?;
                    println!("Removed department {}", department.name);
                }
            }
        }

        Commands::Hours { action } => {
            let hours = &app.managers.hours;
            hours.load_data().await?;
            app.managers.employees.load_data().await?;

            match action {
                HourAction::List => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&hours.entries())?);
                    } else {
                        hours.render(&*sink);
                        print_rows(
                            &["Date", "Employee", "Entry", "Exit", "Hours"],
                            &sink.rows(HOURS_TABLE),
                        );
                        println!();
                        println!("This month: {:.1} h", hours.month_hours(today));
                    }
                }
                HourAction::Add {
                    cedula,
                    entry,
                    exit,
                    date,
                    notes,
                } => {
                    let employee = app
                        .managers
                        .employees
                        .find_by_cedula(&cedula)
                        .with_context(|| format!("No employee with cedula {}", cedula))?;
                    let added = hours
                        .add(
                            HourEntry::new(&employee.id, date.unwrap_or(today), entry, exit)
                                .notes(notes),
                        )
                        .await?;
                    println!(
                        "Logged {:.2} h for {} on {}",
                        added.hours,
                        employee.full_name(),
                        added.date
                    );
                }
            }
        }

        Commands::Payroll { action } => {
            let payroll = &app.managers.payroll;
            payroll.load_data().await?;
            app.managers.employees.load_data().await?;

            match action {
                PayrollAction::List => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&payroll.entries())?);
                    } else {
                        payroll.render(&*sink);
                        print_rows(
                            &[
                                "Period",
                                "Employee",
                                "Base",
                                "Overtime",
                                "Bonuses",
                                "Deductions",
                                "Total",
                            ],
                            &sink.rows(PAYROLL_TABLE),
                        );
                    }
                }
                PayrollAction::Add {
                    cedula,
                    base_salary,
                    month,
                    year,
                    overtime,
                    bonuses,
                    deductions,
                } => {
                    let employee = app
                        .managers
                        .employees
                        .find_by_cedula(&cedula)
                        .with_context(|| format!("No employee with cedula {}", cedula))?;
                    let entry = payroll
                        .add(
                            PayrollEntry::new(
                                &employee.id,
                                month.unwrap_or_else(|| today.month()),
                                year.unwrap_or_else(|| today.year()),
                                base_salary,
                            )
                            .overtime(overtime)
                            .bonuses(bonuses)
                            .deductions(deductions),
                        )
                        .await?;
                    println!(
                        "Payroll {} for {}: total {:.2}",
                        entry.period(),
                        employee.full_name(),
                        entry.total
                    );
                }
                PayrollAction::Export {
                    month,
                    year,
                    output,
                } => {
                    let month = month.map(|m| format!("{:02}", m));
                    let year = year.map(|y| y.to_string());
                    let period = match (&month, &year) {
                        (Some(m), Some(y)) => Some((m.as_str(), y.as_str())),
                        _ => None,
                    };

                    match output {
                        Some(path) => {
                            let file = std::fs::File::create(&path)
                                .with_context(|| format!("creating {:?}", path))?;
                            let written = payroll.export_csv(file, period)?;
                            println!("Exported {} entries to {:?}", written, path);
                        }
                        None => {
                            payroll.export_csv(std::io::stdout(), period)?;
                        }
                    }
                }
            }
        }

        Commands::Dashboard => {
            let refresher = app.refresher();
            refresher.refresh_all_at(today).await;
            let metrics = app.dashboard.compute_metrics(today);

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                match app.reconciler.current_user() {
                    Some(user) => println!("Dashboard for {} ({})", user.display_name, user.role),
                    None => println!("Not signed in; showing empty dashboard"),
                }
                println!();
                for (label, value) in [
                    ("Active employees", metrics.active_employees.to_string()),
                    ("Hours this month", format!("{:.1}", metrics.month_hours)),
                    ("Payroll this month", nomina::view::format::money(metrics.month_payroll)),
                    ("Average hours", format!("{:.1}", metrics.average_hours)),
                ] {
                    println!("  {:<20} {}", label, value);
                }
            }
        }

        // Handled before the app is built
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn print_rows(headers: &[&str], rows: &[TableRow]) {
    if rows.is_empty() {
        println!("No records");
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(headers.to_vec()));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
    for row in rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
}

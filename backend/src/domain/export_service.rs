//! Export service: spreadsheet (CSV) artifacts for rosters and attendance.
//!
//! Every artifact has the same layout: title rows, one blank row, a header
//! row, then one row per entity. [`parse_roster_export`] reads a roster
//! artifact back by locating its header row.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use log::info;
use shared::{ExportDataResponse, Group, Role, Session, StudentFields};

use crate::domain::auth_service::{require_group, visible_groups, AuthError};
use crate::domain::calendar::{bogota_offset, CalendarService};
use crate::domain::report_service::history;
use crate::domain::state::SharedState;

pub const CHURCH_NAME: &str = "El Bosque MMM - Movimiento Misionero Mundial";
pub const ALL_GROUPS_SCOPE: &str = "Todos los Grupos";

const ROSTER_HEADER: [&str; 8] = [
    "#",
    "Nombre Completo",
    "Edad",
    "Teléfono",
    "Dirección",
    "Padres",
    "Notas",
    "Fecha de Registro",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Not authorized for group {0}")]
    Unauthorized(Group),
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<AuthError> for ExportError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized(group) => ExportError::Unauthorized(group),
            other => ExportError::Failed(anyhow::Error::new(other)),
        }
    }
}

/// Writes title rows, a blank row and a header, then data rows
struct SheetWriter {
    writer: csv::Writer<Vec<u8>>,
    rows: usize,
}

impl SheetWriter {
    fn new(titles: &[String], header: &[&str]) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for title in titles {
            writer.write_record([title.as_str()])?;
        }
        writer.write_record([""])?;
        writer.write_record(header)?;
        Ok(Self { writer, rows: 0 })
    }

    fn row<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(fields)?;
        self.rows += 1;
        Ok(())
    }

    fn finish(self, filename: String) -> Result<ExportDataResponse> {
        let bytes = self
            .writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush export: {}", e))?;
        Ok(ExportDataResponse {
            filename,
            content: String::from_utf8(bytes).context("Export is not valid UTF-8")?,
            row_count: self.rows,
        })
    }
}

/// Read the data rows of a roster artifact back into student fields
pub fn parse_roster_export(content: &str) -> Result<Vec<StudentFields>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut students = Vec::new();
    let mut in_data = false;
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed export row {}", line + 1))?;
        if !in_data {
            in_data = record.get(0) == Some(ROSTER_HEADER[0])
                && record.get(1) == Some(ROSTER_HEADER[1]);
            continue;
        }

        let field = |index: usize| -> Option<String> {
            record
                .get(index)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let age = record
            .get(2)
            .unwrap_or_default()
            .parse::<u32>()
            .with_context(|| format!("Invalid age on export row {}", line + 1))?;

        students.push(StudentFields {
            name: field(1).ok_or_else(|| anyhow!("Missing name on export row {}", line + 1))?,
            age,
            phone: field(3),
            address: field(4),
            parents: field(5),
            notes: field(6),
        });
    }

    if !in_data {
        return Err(anyhow!("No roster header row found"));
    }
    Ok(students)
}

#[derive(Clone)]
pub struct ExportService {
    state: SharedState,
    calendar: CalendarService,
}

impl ExportService {
    pub fn new(state: SharedState, calendar: CalendarService) -> Self {
        Self { state, calendar }
    }

    fn format_date(&self, date: NaiveDate) -> String {
        self.calendar.format_short(date)
    }

    /// Roster of one group, ordered by name
    pub fn export_roster(
        &self,
        session: &Session,
        group: Group,
    ) -> Result<ExportDataResponse, ExportError> {
        require_group(session, group)?;

        let mut students = self.state.read().roster(group).to_vec();
        students.sort_by_key(|s| s.name.to_lowercase());

        let today = self.calendar.today();
        let titles = [
            format!("Lista de Estudiantes - {}", group.display_name()),
            CHURCH_NAME.to_string(),
            format!("Fecha de exportación: {}", self.format_date(today)),
        ];
        let mut sheet = SheetWriter::new(&titles, &ROSTER_HEADER)?;

        for (index, student) in students.iter().enumerate() {
            let registered = student
                .created_at
                .with_timezone(&bogota_offset())
                .date_naive();
            sheet.row([
                (index + 1).to_string(),
                student.name.clone(),
                student.age.to_string(),
                student.phone.clone().unwrap_or_default(),
                student.address.clone().unwrap_or_default(),
                student.parents.clone().unwrap_or_default(),
                student.notes.clone().unwrap_or_default(),
                self.format_date(registered),
            ])?;
        }

        let filename = format!(
            "Estudiantes_{}_{}.csv",
            group.display_name(),
            today.format("%Y-%m-%d")
        );
        info!("Exported {} students of {} as {}", students.len(), group, filename);
        Ok(sheet.finish(filename)?)
    }

    /// Attendance history of a year with the columns the role may see
    pub fn export_attendance(
        &self,
        session: &Session,
        year: i32,
    ) -> Result<ExportDataResponse, ExportError> {
        let groups = visible_groups(session.role);
        let scope = match session.role {
            Role::Admin => ALL_GROUPS_SCOPE.to_string(),
            _ => groups
                .first()
                .map(|g| g.display_name().to_string())
                .unwrap_or_default(),
        };

        let history = history(&self.state.read().attendance, year, session.role);

        let titles = [
            format!("Reporte de Asistencias - {}", scope),
            CHURCH_NAME.to_string(),
            format!("Año: {}", year),
        ];

        let sheet = if groups.len() > 1 {
            let mut sheet = SheetWriter::new(
                &titles,
                &[
                    "Fecha",
                    "Niños Presentes",
                    "Total Niños",
                    "Adolescentes Presentes",
                    "Total Adolescentes",
                    "Total General",
                ],
            )?;
            for entry in &history.entries {
                let stats = |group: Group| {
                    entry
                        .groups
                        .iter()
                        .find(|s| s.group == group)
                        .map(|s| (s.present, s.total))
                        .unwrap_or((0, 0))
                };
                let (children_present, children_total) = stats(Group::Children);
                let (teens_present, teens_total) = stats(Group::Teens);
                sheet.row([
                    self.format_date(entry.date),
                    children_present.to_string(),
                    children_total.to_string(),
                    teens_present.to_string(),
                    teens_total.to_string(),
                    (children_present + teens_present).to_string(),
                ])?;
            }
            sheet
        } else {
            let mut sheet =
                SheetWriter::new(&titles, &["Fecha", "Presentes", "Total", "Porcentaje"])?;
            for entry in &history.entries {
                if let Some(stats) = entry.groups.first() {
                    sheet.row([
                        self.format_date(entry.date),
                        stats.present.to_string(),
                        stats.total.to_string(),
                        format!("{}%", stats.percentage),
                    ])?;
                }
            }
            sheet
        };

        let filename = format!("Asistencias_{}_{}.csv", scope, year);
        info!("Exported {} attendance rows as {}", history.entries.len(), filename);
        Ok(sheet.finish(filename)?)
    }
}

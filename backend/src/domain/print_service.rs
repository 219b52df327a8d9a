//! Printable HTML views: blank attendance sheet, student info table and
//! attendance history.

use shared::{Group, PrintDocumentResponse, Role, Session, Student};
use std::fmt::Write;

use crate::domain::auth_service::{require_group, visible_groups, AuthError};
use crate::domain::calendar::CalendarService;
use crate::domain::export_service::{ALL_GROUPS_SCOPE, CHURCH_NAME};
use crate::domain::report_service::history;
use crate::domain::state::SharedState;

const PRINT_STYLE: &str = "body{font-family:Arial,sans-serif;margin:20px}\
h1,h2{text-align:center;margin:4px}\
table{width:100%;border-collapse:collapse;margin-top:16px}\
th,td{border:1px solid #333;padding:6px;text-align:left}\
th{background:#eee}\
.check{width:60px;text-align:center;font-size:18px}";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Full page around a table
fn page(title: &str, subtitle: &str, header: &[&str], rows: &[Vec<String>]) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html><html lang=\"es\"><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{style}</style></head><body><h1>{title}</h1><h2>{church}</h2><p>{subtitle}</p><table><thead><tr>",
        title = escape_html(title),
        style = PRINT_STYLE,
        church = escape_html(CHURCH_NAME),
        subtitle = escape_html(subtitle),
    );
    for column in header {
        let _ = write!(html, "<th>{}</th>", escape_html(column));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(cell);
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></body></html>");
    html
}

fn cell(text: &str) -> String {
    format!("<td>{}</td>", escape_html(text))
}

#[derive(Clone)]
pub struct PrintService {
    state: SharedState,
    calendar: CalendarService,
}

impl PrintService {
    pub fn new(state: SharedState, calendar: CalendarService) -> Self {
        Self { state, calendar }
    }

    fn sorted_roster(&self, group: Group) -> Vec<Student> {
        let mut students = self.state.read().roster(group).to_vec();
        students.sort_by_key(|s| s.name.to_lowercase());
        students
    }

    /// Roster with an empty checkbox per student, for marking by hand
    pub fn roster_sheet(
        &self,
        session: &Session,
        group: Group,
    ) -> Result<PrintDocumentResponse, AuthError> {
        require_group(session, group)?;

        let title = format!("Lista de Asistencia - {}", group.display_name());
        let rows: Vec<Vec<String>> = self
            .sorted_roster(group)
            .iter()
            .enumerate()
            .map(|(index, student)| {
                vec![
                    cell(&(index + 1).to_string()),
                    cell(&student.name),
                    cell(&student.age.to_string()),
                    "<td class=\"check\">&#9744;</td>".to_string(),
                ]
            })
            .collect();

        let subtitle = format!("Fecha: {}", self.calendar.format_long(self.calendar.today()));
        Ok(PrintDocumentResponse {
            html: page(&title, &subtitle, &["#", "Nombre", "Edad", "Asistencia"], &rows),
            title,
        })
    }

    /// Every student field of a group
    pub fn roster_info(
        &self,
        session: &Session,
        group: Group,
    ) -> Result<PrintDocumentResponse, AuthError> {
        require_group(session, group)?;

        let title = format!("Información de Estudiantes - {}", group.display_name());
        let rows: Vec<Vec<String>> = self
            .sorted_roster(group)
            .iter()
            .enumerate()
            .map(|(index, student)| {
                vec![
                    cell(&(index + 1).to_string()),
                    cell(&student.name),
                    cell(&student.age.to_string()),
                    cell(student.phone.as_deref().unwrap_or("-")),
                    cell(student.address.as_deref().unwrap_or("-")),
                    cell(student.parents.as_deref().unwrap_or("-")),
                    cell(student.notes.as_deref().unwrap_or("-")),
                ]
            })
            .collect();

        let subtitle = format!("Total de estudiantes: {}", rows.len());
        Ok(PrintDocumentResponse {
            html: page(
                &title,
                &subtitle,
                &["#", "Nombre", "Edad", "Teléfono", "Dirección", "Padres", "Notas"],
                &rows,
            ),
            title,
        })
    }

    /// Attendance history of a year, scoped to the session's groups
    pub fn attendance_history(&self, session: &Session, year: i32) -> PrintDocumentResponse {
        let groups = visible_groups(session.role);
        let history = history(&self.state.read().attendance, year, session.role);
        let scope = match session.role {
            Role::Admin => ALL_GROUPS_SCOPE,
            _ => groups.first().map(|g| g.display_name()).unwrap_or_default(),
        };

        let mut header = vec!["Fecha".to_string()];
        header.extend(groups.iter().map(|g| g.display_name().to_string()));
        if groups.len() > 1 {
            header.push("Total".to_string());
        }

        let rows: Vec<Vec<String>> = history
            .entries
            .iter()
            .map(|entry| {
                let mut row = vec![cell(&self.calendar.format_short(entry.date))];
                for stats in &entry.groups {
                    row.push(cell(&format!(
                        "{}/{} ({}%)",
                        stats.present, stats.total, stats.percentage
                    )));
                }
                if let Some(combined) = entry.combined {
                    row.push(cell(&format!(
                        "{}/{} ({}%)",
                        combined.present, combined.total, combined.percentage
                    )));
                }
                row
            })
            .collect();

        let title = format!("Historial de Asistencias {} - {}", year, scope);
        let header: Vec<&str> = header.iter().map(String::as_str).collect();
        PrintDocumentResponse {
            html: page(&title, &format!("Domingos registrados: {}", rows.len()), &header, &rows),
            title,
        }
    }
}

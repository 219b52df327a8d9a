use log::{info, warn};
use shared::{
    DeleteStudentResponse, Group, Session, Student, StudentFields, StudentListResponse,
    StudentResponse, SyncOutcome,
};
use uuid::Uuid;

use crate::domain::auth_service::{authorize, require_group, AuthError};
use crate::domain::calendar::CalendarService;
use crate::domain::state::SharedState;
use crate::domain::sync_service::{settle, SyncService};

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Not authorized for group {0}")]
    Unauthorized(Group),
    #[error("{0}")]
    Validation(String),
    #[error("A student named {0} already exists in this group")]
    DuplicateName(String),
    #[error("Student not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<AuthError> for RosterError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized(group) => RosterError::Unauthorized(group),
            other => RosterError::Storage(anyhow::Error::new(other)),
        }
    }
}

/// Trim an optional field, treating blank as absent
fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate and normalize editable fields
pub fn normalize_fields(fields: StudentFields) -> Result<StudentFields, RosterError> {
    let name = fields.name.trim().to_string();
    if name.is_empty() {
        return Err(RosterError::Validation("Student name cannot be empty".to_string()));
    }
    if fields.age == 0 {
        return Err(RosterError::Validation("Student age must be greater than zero".to_string()));
    }

    Ok(StudentFields {
        name,
        age: fields.age,
        phone: clean_optional(fields.phone),
        address: clean_optional(fields.address),
        parents: clean_optional(fields.parents),
        notes: clean_optional(fields.notes),
    })
}

fn outcome_suffix(outcome: SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::CloudSynced => "sincronizado en la nube",
        SyncOutcome::LocalOnly => "guardado localmente",
    }
}

/// Roster CRUD over the two group collections
#[derive(Clone)]
pub struct RosterService {
    state: SharedState,
    sync: SyncService,
    calendar: CalendarService,
}

impl RosterService {
    pub fn new(state: SharedState, sync: SyncService, calendar: CalendarService) -> Self {
        Self {
            state,
            sync,
            calendar,
        }
    }

    /// Roster of a group ordered by name, case-insensitively
    pub fn list_students(
        &self,
        session: &Session,
        group: Group,
    ) -> Result<StudentListResponse, RosterError> {
        require_group(session, group)?;

        let mut students = self.state.read().roster(group).to_vec();
        students.sort_by_key(|s| s.name.to_lowercase());
        Ok(StudentListResponse { group, students })
    }

    pub fn get_student(&self, session: &Session, student_id: &str) -> Result<Student, RosterError> {
        let student = self
            .state
            .read()
            .find_student(student_id)
            .cloned()
            .ok_or_else(|| RosterError::NotFound(student_id.to_string()))?;

        if !authorize(session, student.group) {
            return Err(RosterError::Unauthorized(student.group));
        }
        Ok(student)
    }

    pub async fn add_student(
        &self,
        session: &Session,
        group: Group,
        fields: StudentFields,
    ) -> Result<StudentResponse, RosterError> {
        require_group(session, group)?;
        let fields = normalize_fields(fields)?;
        info!("Adding student {} to {}", fields.name, group);

        let (student, local) = {
            let mut data = self.state.write();
            let roster = data.roster_mut(group);
            if roster.iter().any(|s| s.has_name(&fields.name)) {
                warn!("Rejected duplicate student name {:?} in {}", fields.name, group);
                return Err(RosterError::DuplicateName(fields.name));
            }

            let student = Student {
                id: Uuid::new_v4().to_string(),
                name: fields.name,
                age: fields.age,
                phone: fields.phone,
                address: fields.address,
                parents: fields.parents,
                notes: fields.notes,
                group,
                created_at: self.calendar.now_utc(),
                last_modified_at: None,
                created_by: session.name.clone(),
            };
            roster.push(student.clone());
            let local = self.sync.persist_roster(group, roster);
            (student, local)
        };

        let remote = self.sync.mirror_student(&student).await;
        let outcome = settle(local, remote)?;

        info!("Added student {} ({})", student.name, student.id);
        Ok(StudentResponse {
            success_message: format!("Estudiante agregado ({})", outcome_suffix(outcome)),
            student,
            sync: outcome,
        })
    }

    pub async fn update_student(
        &self,
        session: &Session,
        student_id: &str,
        fields: StudentFields,
    ) -> Result<StudentResponse, RosterError> {
        let fields = normalize_fields(fields)?;
        info!("Updating student {}", student_id);

        let (student, local) = {
            let mut data = self.state.write();
            let group = data
                .find_student(student_id)
                .map(|s| s.group)
                .ok_or_else(|| RosterError::NotFound(student_id.to_string()))?;
            require_group(session, group)?;

            let roster = data.roster_mut(group);
            if roster
                .iter()
                .any(|s| s.id != student_id && s.has_name(&fields.name))
            {
                warn!("Rejected rename of {} to duplicate {:?}", student_id, fields.name);
                return Err(RosterError::DuplicateName(fields.name));
            }

            let now = self.calendar.now_utc();
            let student = match roster.iter_mut().find(|s| s.id == student_id) {
                Some(student) => {
                    student.name = fields.name;
                    student.age = fields.age;
                    student.phone = fields.phone;
                    student.address = fields.address;
                    student.parents = fields.parents;
                    student.notes = fields.notes;
                    student.last_modified_at = Some(now);
                    student.clone()
                }
                None => return Err(RosterError::NotFound(student_id.to_string())),
            };
            let local = self.sync.persist_roster(group, roster);
            (student, local)
        };

        let remote = self.sync.mirror_student(&student).await;
        let outcome = settle(local, remote)?;

        Ok(StudentResponse {
            success_message: format!("Estudiante actualizado ({})", outcome_suffix(outcome)),
            student,
            sync: outcome,
        })
    }

    pub async fn remove_student(
        &self,
        session: &Session,
        student_id: &str,
    ) -> Result<DeleteStudentResponse, RosterError> {
        info!("Removing student {}", student_id);

        let (group, local) = {
            let mut data = self.state.write();
            let group = data
                .find_student(student_id)
                .map(|s| s.group)
                .ok_or_else(|| RosterError::NotFound(student_id.to_string()))?;
            require_group(session, group)?;

            let roster = data.roster_mut(group);
            roster.retain(|s| s.id != student_id);
            let local = self.sync.persist_roster(group, roster);
            (group, local)
        };

        let remote = self.sync.mirror_student_removal(group, student_id).await;
        let outcome = settle(local, remote)?;

        Ok(DeleteStudentResponse {
            student_id: student_id.to_string(),
            sync: outcome,
            success_message: format!("Estudiante eliminado ({})", outcome_suffix(outcome)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::{admin, session_for, sunday_calendar};
    use crate::storage::test_utils::{Breakage, BrokenRemoteStore, TestEnvironment};
    use crate::storage::{keys, Collection, LocalStore, MemoryDocumentStore, RemoteStore};
    use shared::Role;
    use std::sync::Arc;
    use std::time::Duration;

    fn fields(name: &str, age: u32) -> StudentFields {
        StudentFields {
            name: name.to_string(),
            age,
            ..StudentFields::default()
        }
    }

    async fn roster_service(
        local: LocalStore,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> RosterService {
        let state = SharedState::new();
        let calendar = sunday_calendar();
        let sync = SyncService::new(
            state.clone(),
            local,
            remote,
            calendar.clone(),
            Duration::from_millis(200),
        );
        sync.start().await;
        RosterService::new(state, sync, calendar)
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected_case_insensitively() {
        let service = roster_service(LocalStore::in_memory(), None).await;
        let session = admin();

        service
            .add_student(&session, Group::Children, fields("Ana Gómez", 8))
            .await
            .unwrap();
        let err = service
            .add_student(&session, Group::Children, fields("ana gómez", 9))
            .await
            .unwrap_err();
        assert!(matches!(err, RosterError::DuplicateName(_)));

        // Same name is fine in the other group
        service
            .add_student(&session, Group::Teens, fields("Ana Gómez", 13))
            .await
            .unwrap();
        assert_eq!(
            service.list_students(&session, Group::Children).unwrap().students.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_names_stay_unique_through_updates() {
        let service = roster_service(LocalStore::in_memory(), None).await;
        let session = admin();

        let ana = service
            .add_student(&session, Group::Teens, fields("Ana", 13))
            .await
            .unwrap()
            .student;
        let luis = service
            .add_student(&session, Group::Teens, fields("Luis", 14))
            .await
            .unwrap()
            .student;

        let err = service
            .update_student(&session, &luis.id, fields("ANA", 14))
            .await
            .unwrap_err();
        assert!(matches!(err, RosterError::DuplicateName(_)));

        // Renaming a student to a new casing of its own name is allowed
        let updated = service
            .update_student(&session, &ana.id, fields("ana", 15))
            .await
            .unwrap()
            .student;
        assert_eq!(updated.name, "ana");
        assert_eq!(updated.age, 15);
        assert!(updated.last_modified_at.is_some());
        assert_eq!(updated.created_at, ana.created_at);

        let names: Vec<String> = service
            .list_students(&session, Group::Teens)
            .unwrap()
            .students
            .iter()
            .map(|s| s.name.to_lowercase())
            .collect();
        assert_eq!(names, vec!["ana", "luis"]);
    }

    #[tokio::test]
    async fn test_fields_are_validated_and_trimmed() {
        let service = roster_service(LocalStore::in_memory(), None).await;
        let session = admin();

        assert!(matches!(
            service.add_student(&session, Group::Children, fields("   ", 8)).await,
            Err(RosterError::Validation(_))
        ));
        assert!(matches!(
            service.add_student(&session, Group::Children, fields("Pedro", 0)).await,
            Err(RosterError::Validation(_))
        ));

        let mut input = fields("  Pedro Pérez ", 7);
        input.phone = Some(" 300 123 4567 ".to_string());
        input.notes = Some("   ".to_string());
        let student = service
            .add_student(&session, Group::Children, input)
            .await
            .unwrap()
            .student;

        assert_eq!(student.name, "Pedro Pérez");
        assert_eq!(student.phone.as_deref(), Some("300 123 4567"));
        assert_eq!(student.notes, None);
        assert_eq!(student.created_by, "Pastor");
        assert!(student.last_modified_at.is_none());
    }

    #[tokio::test]
    async fn test_teachers_limited_to_their_group() {
        let service = roster_service(LocalStore::in_memory(), None).await;
        let teens_teacher = session_for(Role::TeensTeacher);

        let child = service
            .add_student(&admin(), Group::Children, fields("Sofía", 7))
            .await
            .unwrap()
            .student;

        assert!(matches!(
            service.add_student(&teens_teacher, Group::Children, fields("Mateo", 8)).await,
            Err(RosterError::Unauthorized(Group::Children))
        ));
        assert!(matches!(
            service.get_student(&teens_teacher, &child.id),
            Err(RosterError::Unauthorized(Group::Children))
        ));
        assert!(matches!(
            service.remove_student(&teens_teacher, &child.id).await,
            Err(RosterError::Unauthorized(_))
        ));
        assert!(service.list_students(&teens_teacher, Group::Children).is_err());
        assert_eq!(service.get_student(&admin(), &child.id).unwrap().name, "Sofía");
    }

    #[tokio::test]
    async fn test_missing_students_are_not_found() {
        let service = roster_service(LocalStore::in_memory(), None).await;
        let session = admin();

        assert!(matches!(service.get_student(&session, "gone"), Err(RosterError::NotFound(_))));
        assert!(matches!(
            service.update_student(&session, "gone", fields("X", 5)).await,
            Err(RosterError::NotFound(_))
        ));
        assert!(matches!(
            service.remove_student(&session, "gone").await,
            Err(RosterError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_remote_still_persists_locally() {
        let env = TestEnvironment::new().unwrap();
        let remote: Arc<dyn RemoteStore> = Arc::new(BrokenRemoteStore::new(Breakage::FailingWrites));
        let service = roster_service(env.local_store(), Some(remote)).await;
        let session = admin();

        let added = service
            .add_student(&session, Group::Teens, fields("Camilo", 15))
            .await
            .unwrap();
        assert_eq!(added.sync, SyncOutcome::LocalOnly);

        let updated = service
            .update_student(&session, &added.student.id, fields("Camilo Ruiz", 15))
            .await
            .unwrap();
        assert_eq!(updated.sync, SyncOutcome::LocalOnly);

        let persisted: Vec<Student> = env
            .local_store()
            .load(&keys::roster(Group::Teens))
            .unwrap()
            .unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].name, "Camilo Ruiz");

        let removed = service.remove_student(&session, &added.student.id).await.unwrap();
        assert_eq!(removed.sync, SyncOutcome::LocalOnly);
        let persisted: Vec<Student> = env
            .local_store()
            .load(&keys::roster(Group::Teens))
            .unwrap()
            .unwrap();
        assert!(persisted.is_empty());
    }

    #[tokio::test]
    async fn test_writes_are_mirrored_when_remote_is_live() {
        let remote = Arc::new(MemoryDocumentStore::new());
        let service = roster_service(LocalStore::in_memory(), Some(remote.clone())).await;
        let session = admin();

        let added = service
            .add_student(&session, Group::Children, fields("Lucía", 6))
            .await
            .unwrap();
        assert_eq!(added.sync, SyncOutcome::CloudSynced);
        assert_eq!(remote.document_count(Collection::Students(Group::Children)), 1);

        let removed = service.remove_student(&session, &added.student.id).await.unwrap();
        assert_eq!(removed.sync, SyncOutcome::CloudSynced);
        assert_eq!(remote.document_count(Collection::Students(Group::Children)), 0);
    }
}

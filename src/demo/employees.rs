//! Employee CRUD: repository, service and two controllers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use webcore::component::{ComponentType, DirectorySource, Inject, Marker};
use webcore::error::BoxError;
use webcore::extensibility::handlers::{API_CONTROLLER, HEADER};
use webcore::http::{HttpResponse, Reply};
use webcore::routing::{Args, Operation, Param};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub role: String,
}

pub struct EmployeeRepository {
    rows: Mutex<BTreeMap<i64, Employee>>,
    next_id: AtomicI64,
}

impl Default for EmployeeRepository {
    fn default() -> Self {
        let repository = Self {
            rows: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        };
        for (name, role) in [
            ("Joao Silva", "Developer"),
            ("Maria Santos", "Manager"),
            ("Pedro Costa", "Designer"),
        ] {
            repository.save(Employee {
                id: None,
                name: name.to_string(),
                role: role.to_string(),
            });
        }
        repository
    }
}

impl EmployeeRepository {
    fn rows(&self) -> std::sync::MutexGuard<'_, BTreeMap<i64, Employee>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn find_all(&self) -> Vec<Employee> {
        self.rows().values().cloned().collect()
    }

    pub fn find(&self, id: i64) -> Option<Employee> {
        self.rows().get(&id).cloned()
    }

    pub fn save(&self, mut employee: Employee) -> Employee {
        let id = *employee
            .id
            .get_or_insert_with(|| self.next_id.fetch_add(1, Ordering::Relaxed));
        self.rows().insert(id, employee.clone());
        employee
    }

    pub fn delete(&self, id: i64) -> bool {
        self.rows().remove(&id).is_some()
    }
}

/// Business layer; the repository arrives by field injection.
#[derive(Default)]
pub struct EmployeeService {
    repository: Inject<EmployeeRepository>,
}

impl EmployeeService {
    pub fn list(&self) -> Result<Vec<Employee>, BoxError> {
        Ok(self.repository.get()?.find_all())
    }

    pub fn find(&self, id: i64) -> Result<Option<Employee>, BoxError> {
        Ok(self.repository.get()?.find(id))
    }

    pub fn create(&self, mut employee: Employee) -> Result<Employee, BoxError> {
        employee.id = None;
        Ok(self.repository.get()?.save(employee))
    }

    pub fn update(&self, id: i64, mut employee: Employee) -> Result<Option<Employee>, BoxError> {
        let repository = self.repository.get()?;
        if repository.find(id).is_none() {
            return Ok(None);
        }
        employee.id = Some(id);
        Ok(Some(repository.save(employee)))
    }

    pub fn delete(&self, id: i64) -> Result<bool, BoxError> {
        Ok(self.repository.get()?.delete(id))
    }
}

pub struct EmployeeController {
    service: Arc<EmployeeService>,
}

fn not_found(id: i64) -> Reply {
    HttpResponse::error(StatusCode::NOT_FOUND, format!("Employee {id} not found")).into()
}

impl EmployeeController {
    fn list(&self, _: &Args) -> Result<Reply, BoxError> {
        Reply::json(&self.service.list()?)
    }

    fn get(&self, args: &Args) -> Result<Reply, BoxError> {
        let id: i64 = args.get("id")?;
        match self.service.find(id)? {
            Some(employee) => Reply::json(&employee),
            None => Ok(not_found(id)),
        }
    }

    fn create(&self, args: &Args) -> Result<Reply, BoxError> {
        Reply::json(&self.service.create(args.get("body")?)?)
    }

    fn update(&self, args: &Args) -> Result<Reply, BoxError> {
        let id: i64 = args.get("id")?;
        match self.service.update(id, args.get("body")?)? {
            Some(employee) => Reply::json(&employee),
            None => Ok(not_found(id)),
        }
    }

    fn delete(&self, args: &Args) -> Result<Reply, BoxError> {
        let id: i64 = args.get("id")?;
        if self.service.delete(id)? {
            Ok(Reply::Empty)
        } else {
            Ok(not_found(id))
        }
    }
}

/// Public endpoints behind the CORS middleware, routed under `/api/v1`.
#[derive(Default)]
pub struct PublicApiController;

impl PublicApiController {
    fn health(&self, args: &Args) -> Result<Reply, BoxError> {
        let client: Option<String> = args.get("client")?;
        Reply::json(&serde_json::json!({
            "status": "UP",
            "client": client,
        }))
    }

    fn echo(&self, args: &Args) -> Result<Reply, BoxError> {
        let message: Option<String> = args.get("message")?;
        Ok(Reply::Text(message.unwrap_or_default()))
    }
}

pub fn source() -> DirectorySource {
    DirectorySource::new()
        .with(
            ComponentType::of::<EmployeeRepository>()
                .namespace("app::repository")
                .repository()
                .default_constructor()
                .build(),
        )
        .with(
            ComponentType::of::<EmployeeService>()
                .namespace("app::service")
                .service()
                .default_constructor()
                .inject("repository", |service: &EmployeeService| &service.repository)
                .build(),
        )
        .with(
            ComponentType::of::<EmployeeController>()
                .namespace("app::controller")
                .default_controller()
                .constructor(|resolver| {
                    Ok(EmployeeController {
                        service: resolver.resolve::<EmployeeService>()?,
                    })
                })
                .operation(Operation::new("list", EmployeeController::list).get("/employees"))
                .operation(
                    Operation::new("get", EmployeeController::get)
                        .get("/employees/{id}")
                        .param(Param::path("id").integer()),
                )
                .operation(
                    Operation::new("create", EmployeeController::create)
                        .post("/employees")
                        .param(Param::body::<Employee>())
                        .status(StatusCode::CREATED),
                )
                .operation(
                    Operation::new("update", EmployeeController::update)
                        .put("/employees/{id}")
                        .patch("/employees/{id}")
                        .param(Param::path("id").integer())
                        .param(Param::body::<Employee>()),
                )
                .operation(
                    Operation::new("delete", EmployeeController::delete)
                        .delete("/employees/{id}")
                        .param(Param::path("id").integer()),
                )
                .build(),
        )
        .with(
            ComponentType::of::<PublicApiController>()
                .namespace("app::controller")
                .marker(Marker::custom(API_CONTROLLER).with_attribute("path", "/api"))
                .middleware("cors")
                .default_constructor()
                .operation(
                    Operation::new("health", PublicApiController::health)
                        .get("/health")
                        .param(
                            Param::custom(HEADER, "X-Client")
                                .named("client")
                                .attribute("required", "false"),
                        ),
                )
                .operation(
                    Operation::new("echo", PublicApiController::echo)
                        .get("/echo")
                        .param(Param::query("message")),
                )
                .build(),
        )
}

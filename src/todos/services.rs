use crate::{
    error::{ApiError, Validator},
    todos::{
        dto::{CreateTodoRequest, UpdateTodoRequest},
        repo_types::{NewTodo, TodoPatch},
    },
};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5000;

fn check_title(v: &mut Validator, raw: String) -> String {
    let title = raw.trim().to_string();
    if title.is_empty() {
        v.add("title", "title is required");
    } else if title.chars().count() > MAX_TITLE_LEN {
        v.add("title", format!("title must be at most {MAX_TITLE_LEN} characters"));
    }
    title
}

fn check_description(v: &mut Validator, description: &str) {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        v.add(
            "description",
            format!("description must be at most {MAX_DESCRIPTION_LEN} characters"),
        );
    }
}

pub fn validate_create(req: CreateTodoRequest) -> Result<NewTodo, ApiError> {
    let mut v = Validator::new();

    let title = match req.title {
        Some(raw) => check_title(&mut v, raw),
        None => {
            v.add("title", "title is required");
            String::new()
        }
    };
    let description = req.description.unwrap_or_default();
    check_description(&mut v, &description);

    v.finish()?;
    Ok(NewTodo {
        title,
        description,
        priority: req.priority.unwrap_or_default(),
        completed: req.completed.unwrap_or(false),
        due_date: req.due_date,
    })
}

pub fn validate_update(req: UpdateTodoRequest) -> Result<TodoPatch, ApiError> {
    let mut v = Validator::new();

    let title = req.title.map(|raw| check_title(&mut v, raw));
    if let Some(description) = &req.description {
        check_description(&mut v, description);
    }

    v.finish()?;
    Ok(TodoPatch {
        title,
        description: req.description,
        priority: req.priority,
        completed: req.completed,
        due_date: req.due_date,
    })
}

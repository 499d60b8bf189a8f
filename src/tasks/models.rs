use diesel::{table, Insertable, Queryable};
use rocket::serde::Serialize;

table! {
    #[sql_name = "Tasks"]
    tasks (id) {
        #[sql_name = "ID"]
        id -> Integer,
        #[sql_name = "Text"]
        text -> Text,
        #[sql_name = "Done"]
        done -> Bool,
    }
}

#[derive(Queryable, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: i32,
    pub text: String,
    pub done: bool,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = tasks)]
pub struct NewTask<'a> {
    pub text: &'a str,
    pub done: bool,
}

impl<'a> NewTask<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, done: false }
    }
}

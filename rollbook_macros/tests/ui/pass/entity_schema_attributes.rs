use rollbook_core::{Fetchable, Identifiable, Insertable, ParamValue, Schema};
use rollbook_macros::Entity;

#[derive(Entity, Clone, Debug)]
#[entity(table = "students", primary_key = "id_pk")]
#[entity(check(name = "grade_between_1_and_12", expr = "grade BETWEEN 1 AND 12"))]
#[entity(index(name = "index_name", columns = "name"))]
struct Student {
    #[fetch(id)]
    id: Option<i64>,
    name: String,
    #[fetch(unique = "unique_email", max_length = 55)]
    email: String,
    grade: i64,
    birthday: chrono::NaiveDateTime,
    #[fetch(default = "CURRENT_TIMESTAMP")]
    enrolled_date: chrono::NaiveDateTime,
}

fn main() {
    assert_eq!(Student::TABLE, "students");
    assert_eq!(Student::ID_COLUMN, "id");
    assert_eq!(Student::PRIMARY_KEY_NAME, Some("id_pk"));
    assert_eq!(Student::CHECKS[0].name, "grade_between_1_and_12");
    assert_eq!(Student::INDEXES[0].columns, &["name"]);

    let email = Student::column("email").unwrap();
    assert_eq!(email.sql_type, "VARCHAR(55)");
    assert_eq!(email.unique, Some("unique_email"));
    assert_eq!(
        Student::column("enrolled_date").unwrap().default,
        Some("CURRENT_TIMESTAMP")
    );

    let birthday = chrono::NaiveDate::from_ymd_opt(1912, 6, 23)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let s = Student {
        id: None,
        name: "Alan Turing".into(),
        email: "alan.turing@sherbone.edu".into(),
        grade: 11,
        birthday,
        enrolled_date: birthday,
    };
    assert_eq!(s.id(), None);
    let values = s.insert_values();
    assert_eq!(values.len(), Student::INSERT_COLUMNS.len());
    assert_eq!(values[2], ParamValue::I64(11));
    assert_eq!(values[3], ParamValue::String("1912-06-23 00:00:00".into()));
    let _adapter = StudentRowAdapter;
}

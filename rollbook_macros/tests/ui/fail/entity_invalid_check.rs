use rollbook_macros::Entity;

#[derive(Entity)]
#[entity(check(expr = "grade > 0"))]
struct Pupil {
    #[fetch(id)]
    id: i64,
    grade: i64,
}

fn main() {}

use rollbook_macros::Entity;

#[derive(Entity)]
#[entity(index(name = "index_age", columns = "age"))]
struct Pupil {
    #[fetch(id)]
    id: i64,
    name: String,
}

fn main() {}

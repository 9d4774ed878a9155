use rollbook_macros::Entity;

#[derive(Entity)]
struct Pupil {
    #[fetch(id)]
    id: i64,
    #[fetch(max_length = 3)]
    grade: i64,
}

fn main() {}

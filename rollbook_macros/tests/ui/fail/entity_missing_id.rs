use rollbook_macros::Entity;

#[derive(Entity)]
struct NoId {
    name: String,
}

fn main() {}

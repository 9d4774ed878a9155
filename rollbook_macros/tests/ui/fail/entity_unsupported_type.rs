use rollbook_macros::Entity;

#[derive(Entity)]
struct Blobby {
    #[fetch(id)]
    id: i64,
    payload: Vec<u8>,
}

fn main() {}

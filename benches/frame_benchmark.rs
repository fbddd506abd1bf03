use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tokio_relay::protocol::constants::ClientRevision;
use tokio_relay::world::{Action, ActionFlags, EntityRegistry, HitState};
use tokio_relay::{Direction, Frame};

fn frame_write_read(c: &mut Criterion) {
    c.bench_function("frame_write_read", |b| {
        b.iter(|| {
            let mut frame = Frame::new(0x3012, Direction::ToServer);
            frame.write_u32(black_box(0xDEAD_BEEF)).unwrap();
            frame.write_u16(black_box(7)).unwrap();
            frame.write_string(black_box("benchmark")).unwrap();

            frame.read_u32().unwrap();
            frame.read_u16().unwrap();
            frame.read_string().unwrap()
        })
    });
}

fn action_decode(c: &mut Criterion) {
    // One attack hitting three visible targets.
    let registry = EntityRegistry::new();
    registry.set_player_id(1);

    let mut template = Frame::new(0xB070, Direction::ToClient);
    template.write_u32(760).unwrap(); // skill
    template.write_u32(1).unwrap(); // executor: the player
    template.write_u32(99).unwrap(); // action id
    template.write_u32(2).unwrap(); // target
    template.write_u8(ActionFlags::ATTACK.bits()).unwrap();
    template.write_u8(1).unwrap(); // hit count
    template.write_u8(3).unwrap(); // affected objects
    for unique_id in [0x10u32, 0x11, 0x12] {
        template.write_u32(unique_id).unwrap();
        template.write_u8(HitState::HIT.bits()).unwrap();
        template.write_u8(0).unwrap();
        template.write_i32(120).unwrap();
        template.write_u16(0).unwrap();
        template.write_u8(0).unwrap();
    }

    c.bench_function("action_decode_begin", |b| {
        b.iter(|| {
            let mut frame = template.clone();
            Action::decode_begin(black_box(&mut frame), ClientRevision::Classic, &registry)
                .unwrap()
        })
    });
}

criterion_group!(benches, frame_write_read, action_decode);
criterion_main!(benches);

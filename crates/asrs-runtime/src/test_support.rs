//! A small rack shared by the runtime tests.
//!
//! ```text
//!   y
//!   ^        Pallet.001 (z 0.4..0.6)          Pallet.002          RailStop
//!   |        over the ASRS shuttle            at x = 5            at x = 2.95
//!   +--> x   BARCODE.001 at y = 0.48          BARCODE.002
//! ```
//!
//! The ASRS shuttle starts at the origin with its top sensors just inside
//! Pallet.001.  The carrier shuttle sits at x = 10 with a post touching
//! `SENSOR_L1`.

use asrs_hal::SimScene;
use asrs_perception::Vec3;
use asrs_types::BodyId;

pub(crate) struct Rack {
    pub scene: SimScene,
    pub asrs: BodyId,
    pub carrier: BodyId,
    pub pallet: BodyId,
    pub far_pallet: BodyId,
}

fn sensor() -> Vec3 {
    Vec3::new(0.05, 0.05, 0.05)
}

pub(crate) fn rack() -> Rack {
    let mut scene = SimScene::new();

    let asrs = scene.add_box("ASRS_Shuttle", Vec3::new(1.0, 0.5, 0.1), Vec3::zero());
    let asrs_sensors = [
        ("SENSOR_F", Vec3::new(0.2, 0.0, 0.38)),
        ("SENSOR_B", Vec3::new(-0.2, 0.0, 0.38)),
        ("SENSOR_FL", Vec3::new(0.5, 0.3, 0.38)),
        ("SENSOR_BR", Vec3::new(-0.5, -0.3, 0.38)),
        ("SENSOR_FR", Vec3::new(0.5, -0.3, 0.38)),
        ("SENSOR_BL", Vec3::new(-0.5, 0.3, 0.38)),
        ("SENSOR_FRONT", Vec3::new(1.05, 0.0, 0.0)),
        ("SENSOR_END", Vec3::new(-1.05, 0.0, 0.0)),
        ("SENSOR_BARCODE", Vec3::new(0.0, 0.48, 0.38)),
    ];
    for (name, offset) in asrs_sensors {
        scene
            .add_child_box(name, asrs, sensor(), offset)
            .expect("shuttle exists");
    }

    let carrier = scene.add_box(
        "Carrier_Shuttle",
        Vec3::new(0.5, 1.0, 0.1),
        Vec3::new(10.0, 0.0, 0.0),
    );
    let carrier_sensors = [
        ("SENSOR_L1", Vec3::new(0.55, 0.5, 0.0)),
        ("SENSOR_L2", Vec3::new(0.55, -0.5, 0.0)),
        ("SENSOR_SHUTTLE1", Vec3::new(-0.55, 0.5, 0.0)),
        ("SENSOR_SHUTTLE2", Vec3::new(-0.55, -0.5, 0.0)),
    ];
    for (name, offset) in carrier_sensors {
        scene
            .add_child_box(name, carrier, sensor(), offset)
            .expect("carrier exists");
    }

    let pallet = scene.add_box(
        "Pallet.001",
        Vec3::new(0.6, 0.4, 0.1),
        Vec3::new(0.0, 0.0, 0.5),
    );
    let far_pallet = scene.add_box(
        "Pallet.002",
        Vec3::new(0.6, 0.4, 0.1),
        Vec3::new(5.0, 0.0, 0.5),
    );
    scene.add_box("BARCODE.001", sensor(), Vec3::new(0.0, 0.48, 0.38));
    scene.add_box("BARCODE.002", sensor(), Vec3::new(5.0, 0.48, 0.38));
    scene.add_box("RailStop", Vec3::new(0.1, 0.5, 0.1), Vec3::new(2.95, 0.0, 0.0));
    scene.add_box("Post_L1", Vec3::new(0.02, 0.02, 0.02), Vec3::new(10.6, 0.5, 0.0));
    scene.add_empty("Rail_Origin", Vec3::zero());

    Rack {
        scene,
        asrs,
        carrier,
        pallet,
        far_pallet,
    }
}

use serde_json::json;
use spine2d_path::{Skeleton, SkeletonData};
use std::path::PathBuf;

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut positional = Vec::<String>::new();
    let mut position_override: Option<f32> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--position" => {
                position_override = args.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            other => {
                positional.push(other.to_string());
                i += 1;
            }
        }
    }

    let Some(json_path) = positional.first().map(PathBuf::from) else {
        eprintln!("usage: pose_dump <skeleton.json> [--position <value>]");
        std::process::exit(2);
    };

    let json = std::fs::read_to_string(&json_path).expect("read json");
    let data = SkeletonData::from_json_str(&json).expect("parse json");
    let mut skeleton = Skeleton::new(data).expect("build skeleton");

    skeleton.set_to_setup_pose();
    if let Some(position) = position_override {
        for c in &mut skeleton.path_constraints {
            c.position = position;
        }
    }
    skeleton.update_world_transform();

    let bones: Vec<_> = skeleton
        .bones
        .iter()
        .enumerate()
        .map(|(i, bone)| {
            let name = skeleton
                .data
                .bones
                .get(i)
                .map(|b| b.name.as_str())
                .unwrap_or("<unknown>");
            json!({
                "name": name,
                "worldX": bone.world_x,
                "worldY": bone.world_y,
                "a": bone.a,
                "b": bone.b,
                "c": bone.c,
                "d": bone.d,
            })
        })
        .collect();

    let out = json!({ "bones": bones });
    println!(
        "{}",
        serde_json::to_string_pretty(&out).expect("serialize pose")
    );
}

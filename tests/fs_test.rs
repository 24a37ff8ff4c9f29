//! End-to-end scenarios over the public API.

mod common;

use std::io::SeekFrom;

use common::{mounted, TestImage};
use filefs::{EntryKind, FileFs, FsError};

#[test]
fn write_survives_remount() {
    let (img, mut fs) = mounted("remount");
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    let mut f = fs.open("/a/b/x", "w").unwrap();
    assert_eq!(fs.write(&mut f, b"hello").unwrap(), 5);
    fs.close(f);
    fs.umount().unwrap();

    fs.mount(img.path()).unwrap();
    let mut f = fs.open("/a/b/x", "r").unwrap();
    let mut buf = [0u8; 5];
    assert_eq!(fs.read(&mut f, &mut buf).unwrap(), 5);
    assert_eq!(&buf, b"hello");
    assert_eq!(fs.read(&mut f, &mut buf).unwrap(), 0);
}

#[test]
fn directory_grows_into_a_second_block() {
    let (img, mut fs) = mounted("dirgrow");
    // 18 children fill the root head exactly (with `.` and `..`).
    for i in 0..18 {
        let f = fs.open(&format!("f{:02}", i), "w").unwrap();
        fs.close(f);
    }
    fs.umount().unwrap();
    assert_eq!(img.len(), 2 * 512);

    fs.mount(img.path()).unwrap();
    let f = fs.open("f18", "w").unwrap();
    fs.close(f);
    fs.umount().unwrap();
    assert_eq!(img.len(), 3 * 512);
}

#[test]
fn twenty_five_files_enumerate() {
    let (img, mut fs) = mounted("enum25");
    for i in 0..25 {
        let f = fs.open(&format!("/f{:02}", i), "w").unwrap();
        fs.close(f);
    }
    let mut dir = fs.open_dir("/").unwrap();
    let mut names = Vec::new();
    let mut roots = 0;
    while let Some(ent) = dir.read_entry() {
        if ent.kind() == EntryKind::Root {
            roots += 1;
        } else {
            assert_eq!(ent.kind(), EntryKind::File);
            names.push(ent.name().into_owned());
        }
    }
    assert_eq!(roots, 2);
    assert_eq!(names.len(), 25);
    names.sort();
    for (i, name) in names.iter().enumerate() {
        assert_eq!(name, &format!("f{:02}", i));
    }
    fs.umount().unwrap();
    // Superblock, root head, one extension block.
    assert_eq!(img.len(), 3 * 512);
}

#[test]
fn emptied_extension_block_is_reused() {
    let (img, mut fs) = mounted("dirshrink");
    for i in 0..19 {
        let f = fs.open(&format!("f{:02}", i), "w").unwrap();
        fs.close(f);
    }
    fs.umount().unwrap();
    assert_eq!(img.len(), 3 * 512);

    // Removing the 19th entry empties and frees the extension block; the
    // next content block then comes from the free list instead of growing.
    fs.mount(img.path()).unwrap();
    fs.remove("f18").unwrap();
    let mut f = fs.open("f00", "a").unwrap();
    fs.write(&mut f, b"z").unwrap();
    fs.close(f);
    fs.umount().unwrap();
    assert_eq!(img.len(), 3 * 512);
}

#[test]
fn exact_payload_multiple_uses_exact_blocks() {
    let (img, mut fs) = mounted("fullblocks");
    let mut f = fs.open("/k", "w").unwrap();
    fs.write(&mut f, &[7u8; 1000]).unwrap();
    fs.close(f);
    fs.umount().unwrap();
    // Superblock, root, two exactly-full content blocks.
    assert_eq!(img.len(), 4 * 512);

    fs.mount(img.path()).unwrap();
    let mut f = fs.open("/k", "a").unwrap();
    assert_eq!(fs.tell(&f), 1000);
    fs.write(&mut f, b"!").unwrap();
    fs.close(f);
    fs.umount().unwrap();
    assert_eq!(img.len(), 5 * 512);
}

#[test]
fn overwrite_in_the_middle() {
    let (_img, mut fs) = mounted("overwrite");
    let pattern: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let mut f = fs.open("/big", "w").unwrap();
    assert_eq!(fs.write(&mut f, &pattern).unwrap(), 10_000);
    fs.close(f);

    let mut f = fs.open("/big", "r+").unwrap();
    fs.seek(&mut f, SeekFrom::Start(15)).unwrap();
    fs.write(&mut f, b".....insert.....").unwrap();
    assert_eq!(fs.tell(&f), 31);
    fs.close(f);

    let mut f = fs.open("/big", "r").unwrap();
    let mut back = vec![0u8; 10_000];
    assert_eq!(fs.read(&mut f, &mut back).unwrap(), 10_000);
    assert_eq!(&back[15..31], b".....insert.....");
    assert_eq!(back[..15], pattern[..15]);
    assert_eq!(back[31..], pattern[31..]);
}

#[test]
fn seek_clamps_and_walks_both_ways() {
    let (_img, mut fs) = mounted("seek");
    let data: Vec<u8> = (0..1400u32).map(|i| (i % 199) as u8).collect();
    let mut f = fs.open("/s", "w+").unwrap();
    fs.write(&mut f, &data).unwrap();

    assert_eq!(fs.seek(&mut f, SeekFrom::Current(1_000_000)).unwrap(), 1400);
    assert_eq!(fs.seek(&mut f, SeekFrom::Current(-1_000_000)).unwrap(), 0);
    assert_eq!(fs.seek(&mut f, SeekFrom::End(-20)).unwrap(), 1380);

    let mut tail = [0u8; 40];
    assert_eq!(fs.read(&mut f, &mut tail).unwrap(), 20);
    assert_eq!(&tail[..20], &data[1380..]);

    // Backward across a block boundary.
    assert_eq!(fs.seek(&mut f, SeekFrom::Current(-800)).unwrap(), 600);
    let mut mid = [0u8; 4];
    fs.read(&mut f, &mut mid).unwrap();
    assert_eq!(&mid, &data[600..604]);

    fs.rewind(&mut f).unwrap();
    assert_eq!(fs.tell(&f), 0);
}

#[test]
fn truncating_open_discards_old_contents() {
    let (_img, mut fs) = mounted("trunc");
    let mut f = fs.open("/t", "w").unwrap();
    fs.write(&mut f, &[1u8; 2000]).unwrap();
    fs.close(f);

    let mut f = fs.open("/t", "w").unwrap();
    fs.write(&mut f, b"tiny").unwrap();
    fs.close(f);

    let mut f = fs.open("/t", "a+").unwrap();
    assert_eq!(fs.tell(&f), 4);
    fs.rewind(&mut f).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(fs.read(&mut f, &mut buf).unwrap(), 4);
    assert_eq!(&buf[..4], b"tiny");
}

#[test]
fn open_mode_contract() {
    let (_img, mut fs) = mounted("modes");
    assert!(matches!(fs.open("/nope", "r"), Err(FsError::FileNotFound)));
    assert!(matches!(fs.open("/nope", "r+"), Err(FsError::FileNotFound)));
    assert!(matches!(fs.open("/x", "rw"), Err(FsError::NameFormat)));

    fs.mkdir("/d").unwrap();
    assert!(matches!(fs.open("/d", "w"), Err(FsError::TypeMismatch)));

    let mut f = fs.open("/x", "w").unwrap();
    assert!(matches!(fs.read(&mut f, &mut [0u8; 4]), Err(FsError::Io(_))));
    fs.close(f);
    let mut f = fs.open("/x", "r").unwrap();
    assert!(matches!(fs.write(&mut f, b"no"), Err(FsError::Io(_))));
    fs.close(f);
}

#[test]
fn namespace_error_kinds() {
    let (_img, mut fs) = mounted("errors");
    fs.mkdir("/d").unwrap();
    assert!(matches!(fs.mkdir("/d"), Err(FsError::Exists)));
    assert!(matches!(
        fs.mkdir("/name-beyond-fourteen"),
        Err(FsError::NameTooLong)
    ));
    assert!(matches!(fs.mkdir("/no/such/parent"), Err(FsError::PathNotFound)));
    assert!(matches!(fs.mkdir(""), Err(FsError::NameFormat)));

    let f = fs.open("/d/inner", "w").unwrap();
    fs.close(f);
    assert!(matches!(fs.rmdir("/d"), Err(FsError::NotEmpty)));
    assert!(matches!(fs.rmdir("/d/inner"), Err(FsError::TypeMismatch)));
    assert!(matches!(fs.remove("/d"), Err(FsError::TypeMismatch)));
    assert!(matches!(fs.remove("/d/gone"), Err(FsError::FileNotFound)));

    fs.remove("/d/inner").unwrap();
    fs.rmdir("/d").unwrap();
    assert!(!fs.dir_exists("/d").unwrap());
}

#[test]
fn mkdir_rmdir_round_trip() {
    let (_img, mut fs) = mounted("mkrm");
    fs.mkdir("/p").unwrap();
    assert!(fs.dir_exists("/p").unwrap());
    assert!(!fs.file_exists("/p").unwrap());
    fs.rmdir("/p").unwrap();
    assert!(!fs.dir_exists("/p").unwrap());
}

#[test]
fn rename_round_trip_and_migration() {
    let (_img, mut fs) = mounted("rename");
    let mut f = fs.open("/a", "w").unwrap();
    fs.write(&mut f, b"payload").unwrap();
    fs.close(f);

    fs.rename("/a", "/b").unwrap();
    assert!(!fs.file_exists("/a").unwrap());
    assert!(fs.file_exists("/b").unwrap());
    fs.rename("/b", "/a").unwrap();
    assert!(fs.file_exists("/a").unwrap());

    fs.mkdir("/dir").unwrap();
    fs.rename("/a", "/dir/a2").unwrap();
    assert!(fs.file_exists("/dir/a2").unwrap());
    let mut f = fs.open("/dir/a2", "r").unwrap();
    let mut buf = [0u8; 7];
    fs.read(&mut f, &mut buf).unwrap();
    assert_eq!(&buf, b"payload");
    fs.close(f);

    assert!(matches!(fs.rename("/dir", "/dir2/"), Ok(())));
    assert!(matches!(fs.rename("/dir2/a2", "/x/"), Err(FsError::TypeMismatch)));
}

#[test]
fn move_updates_dotdot() {
    let (_img, mut fs) = mounted("move");
    fs.mkdir("/a").unwrap();
    fs.mkdir("/b").unwrap();
    fs.mv("/a", "/b").unwrap();
    assert!(fs.dir_exists("/b/a").unwrap());
    assert!(!fs.dir_exists("/a").unwrap());

    // Resolving `..` through the moved directory must land in /b.
    let f = fs.open("/b/a/../probe", "w").unwrap();
    fs.close(f);
    assert!(fs.file_exists("/b/probe").unwrap());

    // And back again.
    fs.mv("/b/a", "/").unwrap();
    assert!(fs.dir_exists("/a").unwrap());
    assert!(!fs.dir_exists("/b/a").unwrap());
}

#[test]
fn move_into_own_subtree_is_rejected() {
    let (_img, mut fs) = mounted("subtree");
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    assert!(fs.mv("/a", "/a/b").is_err());
    assert!(fs.mv("/a", "/a").is_err());
    assert!(fs.rename("/a", "/a/b/c").is_err());
    assert!(fs.dir_exists("/a/b").unwrap());
}

#[test]
fn copy_then_remove_is_identity() {
    let (_img, mut fs) = mounted("copy");
    let body: Vec<u8> = (0..1234u32).map(|i| (i % 250) as u8).collect();
    let mut f = fs.open("/src", "w").unwrap();
    fs.write(&mut f, &body).unwrap();
    fs.close(f);

    fs.mkdir("/into").unwrap();
    fs.copy("/src", "/into").unwrap();
    fs.copy("/src", "/src2").unwrap();
    assert!(matches!(fs.copy("/src", "/src2"), Err(FsError::Exists)));

    for path in ["/into/src", "/src2"] {
        let mut f = fs.open(path, "r").unwrap();
        let mut back = vec![0u8; 1234];
        assert_eq!(fs.read(&mut f, &mut back).unwrap(), 1234);
        assert_eq!(back, body);
        fs.close(f);
    }

    fs.remove("/into/src").unwrap();
    fs.remove("/src2").unwrap();
    assert!(fs.file_exists("/src").unwrap());
    assert!(!fs.file_exists("/src2").unwrap());
}

#[test]
fn working_directory_and_home() {
    let (_img, mut fs) = mounted("cwd");
    fs.mkdir("/w").unwrap();
    fs.mkdir("/w/deep").unwrap();

    fs.chdir("/w").unwrap();
    assert_eq!(fs.getcwd().unwrap(), "/w");
    let f = fs.open("rel", "w").unwrap();
    fs.close(f);
    assert!(fs.file_exists("/w/rel").unwrap());

    fs.chdir("deep").unwrap();
    assert_eq!(fs.getcwd().unwrap(), "/w/deep");
    fs.chdir("..").unwrap();
    assert_eq!(fs.getcwd().unwrap(), "/w");
    fs.chdir("././deep/..").unwrap();
    assert_eq!(fs.getcwd().unwrap(), "/w");

    fs.set_home("/w/deep").unwrap();
    assert_eq!(fs.home().unwrap(), "/w/deep");
    let f = fs.open("~/homed", "w").unwrap();
    fs.close(f);
    assert!(fs.file_exists("/w/deep/homed").unwrap());
    assert!(fs.dir_exists("~").unwrap());

    fs.set_work().unwrap();
    fs.chdir("/").unwrap();
    fs.ch_work().unwrap();
    assert_eq!(fs.getcwd().unwrap(), "/w");
}

#[test]
fn readdir_kinds_in_subdirectories() {
    let (_img, mut fs) = mounted("kinds");
    fs.mkdir("/d").unwrap();
    let f = fs.open("/d/f", "w").unwrap();
    fs.close(f);

    let mut dir = fs.open_dir("/d").unwrap();
    assert_eq!(dir.path(), "/d");
    let mut dot_kinds = Vec::new();
    let mut file_seen = false;
    while let Some(ent) = dir.read_entry() {
        match ent.name_bytes() {
            b"." | b".." => dot_kinds.push(ent.kind()),
            b"f" => {
                assert_eq!(ent.kind(), EntryKind::File);
                file_seen = true;
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }
    assert!(file_seen);
    assert_eq!(dot_kinds, [EntryKind::Dir, EntryKind::Dir]);
    fs.close_dir(dir);
}

#[test]
fn explicit_transaction_rollback() {
    let (_img, mut fs) = mounted("txroll");
    fs.begin().unwrap();
    let mut f = fs.open("/t", "w").unwrap();
    fs.write(&mut f, &[9u8; 1000]).unwrap();
    fs.close(f);
    assert!(fs.file_exists("/t").unwrap());
    fs.rollback().unwrap();
    assert!(!fs.file_exists("/t").unwrap());
}

#[test]
fn explicit_transaction_commit_persists() {
    let (img, mut fs) = mounted("txcommit");
    fs.begin().unwrap();
    fs.mkdir("/d").unwrap();
    let mut f = fs.open("/d/x", "w").unwrap();
    fs.write(&mut f, b"committed").unwrap();
    fs.close(f);
    fs.commit().unwrap();
    fs.umount().unwrap();

    fs.mount(img.path()).unwrap();
    let mut f = fs.open("/d/x", "r").unwrap();
    let mut buf = [0u8; 9];
    fs.read(&mut f, &mut buf).unwrap();
    assert_eq!(&buf, b"committed");
}

#[test]
fn transaction_state_errors() {
    let (_img, mut fs) = mounted("txstate");
    assert!(matches!(fs.commit(), Err(FsError::TxNotActive)));
    assert!(matches!(fs.rollback(), Err(FsError::TxNotActive)));
    fs.begin().unwrap();
    assert!(matches!(fs.begin(), Err(FsError::TxAlreadyActive)));
    fs.rollback().unwrap();
}

#[test]
fn rollback_restores_working_directory() {
    let (_img, mut fs) = mounted("txcwd");
    fs.begin().unwrap();
    fs.mkdir("/d").unwrap();
    fs.chdir("/d").unwrap();
    assert_eq!(fs.getcwd().unwrap(), "/d");
    fs.rollback().unwrap();
    assert_eq!(fs.getcwd().unwrap(), "/");
}

#[test]
fn mount_is_identity_on_image_bytes() {
    let (img, mut fs) = mounted("identity");
    fs.mkdir("/stable").unwrap();
    let mut f = fs.open("/stable/f", "w").unwrap();
    fs.write(&mut f, b"fixed").unwrap();
    fs.close(f);
    fs.umount().unwrap();

    let before = img.bytes();
    fs.mount(img.path()).unwrap();
    fs.umount().unwrap();
    assert_eq!(before, img.bytes());
}

#[test]
fn unmounted_operations_fail() {
    let img = TestImage::new("unmounted");
    let mut fs = FileFs::new();
    assert!(!fs.is_mounted());
    assert!(matches!(fs.mkdir("/x"), Err(FsError::NotMounted)));
    assert!(matches!(fs.getcwd(), Err(FsError::NotMounted)));
    assert!(matches!(fs.umount(), Err(FsError::NotMounted)));

    fs.mount(img.path()).unwrap();
    assert!(fs.is_mounted());
    fs.umount().unwrap();
    assert!(!fs.is_mounted());
}

#![no_main]

use labels::parser::parse;
use labels::{Dialect, ListFileConfig};
use libfuzzer_sys::fuzz_target;
use memory_model::{MemoryModel, PredefinedModel};

fuzz_target!(|data: &[u8]| {
    let Some((&selector, text)) = data.split_first() else {
        return;
    };
    let Ok(mut file) = tempfile::NamedTempFile::new() else {
        return;
    };
    if std::io::Write::write_all(&mut file, text).is_err() {
        return;
    }

    let path = file.path().to_string_lossy().into_owned();
    let mut config = ListFileConfig::new(path.clone()).with_map_file(path);
    if selector & 0x80 != 0 {
        config = config.with_src_dirs([""]);
    }
    config.disable_banking = selector & 0x40 != 0;

    let dialect = match selector % 5 {
        0 => Dialect::Sjasmplus(config),
        1 => Dialect::Z80asm(config),
        2 => Dialect::Z88dk(config),
        3 => Dialect::Z88dkV2(config),
        _ => Dialect::RevEng(config),
    };
    let kind = if selector & 0x20 != 0 {
        PredefinedModel::ZxNextTwoRom
    } else {
        PredefinedModel::Zx128k
    };
    let Ok(model) = MemoryModel::predefined(kind) else {
        return;
    };
    let _ = parse(&dialect, &model);
});
